use std::cell::UnsafeCell;

#[repr(transparent)]
pub struct SyncUnsafeCell<T: ?Sized> {
    value: UnsafeCell<T>,
}

impl<T> SyncUnsafeCell<T> {
    pub fn new(value: T) -> Self {
        Self { value: UnsafeCell::new(value) }
    }
}

impl<T: ?Sized> SyncUnsafeCell<T> {
    pub fn get(&self) -> *mut T { self.value.get() }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

unsafe impl<T: ?Sized + Send> Send for SyncUnsafeCell<T> {}

// Sharing a cell hands out `&T` to every thread and lets one thread move a `T` in.
unsafe impl<T: ?Sized + Send + Sync> Sync for SyncUnsafeCell<T> {}
