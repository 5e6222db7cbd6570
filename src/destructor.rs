use core::fmt;
use core::ptr::NonNull;
use std::sync::Arc;

enum Dispose<T> {
    Deallocate,
    Leak,
    Custom(Arc<dyn Fn(NonNull<T>) + Send + Sync>),
}

/// Cleanup routine a shared block runs on its value when the value is replaced by
/// absorption or when the last owner goes away.
///
/// The routine receives ownership of the pointer. The default one assumes the pointer
/// came from `Box` and deallocates it as such.
pub struct Destructor<T> {
    dispose : Dispose<T>,
}

impl <T> Destructor<T> {
    pub fn new<F>(f : F) -> Destructor<T>
    where F : Fn(NonNull<T>) + Send + Sync + 'static
    {
        Destructor { dispose : Dispose::Custom(Arc::new(f)) }
    }

    /// A destructor that never frees anything. For values whose memory is owned elsewhere.
    pub fn leak() -> Destructor<T>
    {
        Destructor { dispose : Dispose::Leak }
    }

    // ptr must be uniquely owned by the caller and must not be used afterwards.
    pub(crate) unsafe fn dispose(&self, ptr : NonNull<T>)
    {
        match &self.dispose {
            Dispose::Deallocate => drop(Box::from_raw(ptr.as_ptr())),
            Dispose::Leak => {},
            Dispose::Custom(f) => f(ptr),
        }
    }
}

impl <T> Default for Destructor<T> {
    fn default() -> Destructor<T>
    {
        Destructor { dispose : Dispose::Deallocate }
    }
}

impl <T> Clone for Destructor<T> {
    fn clone(&self) -> Destructor<T>
    {
        let dispose = match &self.dispose {
            Dispose::Deallocate => Dispose::Deallocate,
            Dispose::Leak => Dispose::Leak,
            Dispose::Custom(f) => Dispose::Custom(Arc::clone(f)),
        };
        Destructor { dispose }
    }
}

impl <T> fmt::Debug for Destructor<T> {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let kind = match self.dispose {
            Dispose::Deallocate => "Deallocate",
            Dispose::Leak => "Leak",
            Dispose::Custom(_) => "Custom",
        };
        f.debug_tuple("Destructor").field(&kind).finish()
    }
}
