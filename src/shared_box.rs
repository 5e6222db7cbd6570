use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};

mod block;
use self::block::*;

use crate::destructor::Destructor;
use crate::error::{Error, Result};

/// A reference counted box whose value can be overwritten or taken away for every owner at once.
///
/// Cloning a `SharedBox` shares the underlying block, so writes made through [`assign`](SharedBox::assign)
/// are observed by all clones. A handle may be absent (no block at all), or point to a block whose value
/// has been released.
///
/// Every operation that may install a block into a handle takes `&mut self`, therefore a handle that is
/// shared between threads before it holds a block needs to be synchronized by its owner.
pub struct SharedBox<T> {
    block : Option<NonNull<SharedBlock<T>>>,
    _ph : PhantomData<T>
}

// Safe access to T always goes through the block lock, as with Arc<Mutex<T>>.
unsafe impl <T : Send> Send for SharedBox<T> {}
unsafe impl <T : Send> Sync for SharedBox<T> {}

impl <T> SharedBox<T> {
    /// Creates an absent handle.
    pub const fn empty() -> SharedBox<T>
    {
        SharedBox { block : None, _ph : PhantomData }
    }

    pub fn new(value : T) -> SharedBox<T>
    {
        SharedBox::from_block(SharedBlock::allocate(Some(boxed(value)), Destructor::default()))
    }

    pub fn from_ref(value : &T) -> SharedBox<T>
    where T : Clone
    {
        SharedBox::new(value.clone())
    }

    /// Creates a box that disposes of its value with `destructor`. Fails with `InvalidArgument` when
    /// no destructor is given; nothing is allocated in that case.
    pub fn with_destructor(value : T, destructor : Option<Destructor<T>>) -> Result<SharedBox<T>>
    {
        let destructor = destructor.ok_or_else(|| Error::invalid_argument("destructor is absent"))?;
        Ok(SharedBox::from_block(SharedBlock::allocate(Some(boxed(value)), destructor)))
    }

    pub fn from_box(value : Box<T>) -> SharedBox<T>
    {
        unsafe { SharedBox::from_raw(Box::into_raw(value)) }
    }

    /// Takes ownership of `ptr`. A null pointer yields a box with a block but no value.
    ///
    /// # Safety
    /// `ptr` must be null or come from `Box::into_raw`, and must not be used by the caller afterwards.
    pub unsafe fn from_raw(ptr : *mut T) -> SharedBox<T>
    {
        SharedBox::from_block(SharedBlock::allocate(NonNull::new(ptr), Destructor::default()))
    }

    /// Takes ownership of `ptr`, to be disposed of with `destructor`. Fails with `InvalidArgument` when no
    /// destructor is given, in which case `ptr` is left untouched.
    ///
    /// # Safety
    /// `ptr` must be null or valid for reads and writes, and `destructor` must be able to dispose of it.
    pub unsafe fn from_raw_with_destructor(ptr : *mut T, destructor : Option<Destructor<T>>) -> Result<SharedBox<T>>
    {
        let destructor = destructor.ok_or_else(|| Error::invalid_argument("destructor is absent"))?;
        Ok(SharedBox::from_block(SharedBlock::allocate(NonNull::new(ptr), destructor)))
    }

    #[inline(always)]
    fn from_block(block : NonNull<SharedBlock<T>>) -> SharedBox<T>
    {
        SharedBox { block : Some(block), _ph : PhantomData }
    }

    #[inline(always)]
    fn block(&self) -> Option<&SharedBlock<T>>
    {
        // (O) the block outlives every handle pointing at it
        self.block.map(|b| unsafe { &*b.as_ptr() })
    }

    /// Moves `value` into the box. If the block already holds a value it is overwritten in place and
    /// every clone of this box observes the new value.
    pub fn assign(&mut self, value : T)
    {
        match self.block() {
            Some(block) => block.lock().store(value),
            None => *self = SharedBox::new(value),
        }
    }

    /// Same as [`assign`](SharedBox::assign), but clones `value` onto the current one.
    pub fn assign_from(&mut self, value : &T)
    where T : Clone
    {
        match self.block() {
            Some(block) => block.lock().store_from(value),
            None => *self = SharedBox::from_ref(value),
        }
    }

    /// Replaces the value with `ptr`. The previous value, if any, is disposed of by the block's destructor
    /// while the block is locked.
    ///
    /// # Safety
    /// `ptr` must be null or valid for reads and writes, owned by nobody else, and disposable by the
    /// destructor currently installed on the block.
    pub unsafe fn absorb(&mut self, ptr : *mut T)
    {
        let ptr = NonNull::new(ptr);
        match self.block() {
            Some(block) => block.lock().replace(ptr),
            None => *self = SharedBox::from_block(SharedBlock::allocate(ptr, Destructor::default())),
        }
    }

    pub fn absorb_box(&mut self, value : Box<T>)
    {
        unsafe { self.absorb(Box::into_raw(value)) }
    }

    /// Makes this handle share the block of `other`.
    pub fn share_from(&mut self, other : &SharedBox<T>)
    {
        self.clone_from(other)
    }

    /// Adopts the block of `other`, leaving `other` absent. Owner counts are untouched.
    pub fn move_from(&mut self, other : &mut SharedBox<T>)
    {
        *self = other.take();
    }

    /// Takes the block out of this handle, leaving it absent.
    pub fn take(&mut self) -> SharedBox<T>
    {
        mem::take(self)
    }

    /// Returns a reference to the value without holding the lock.
    ///
    /// # Safety
    /// No other handle of this box may assign, absorb, release or drop the value while the returned
    /// reference is alive. Unless `T : Sync`, no other thread may access the value either.
    pub unsafe fn get(&self) -> Result<&T>
    {
        let ptr = self.value_ptr().ok_or_else(Error::null_dereference)?;
        Ok(&*ptr.as_ptr())
    }

    /// Mutable counterpart of [`get`](SharedBox::get).
    ///
    /// # Safety
    /// No other handle of this box may access the value in any way while the returned reference is alive.
    pub unsafe fn get_mut(&mut self) -> Result<&mut T>
    {
        let ptr = self.value_ptr().ok_or_else(Error::null_dereference)?;
        Ok(&mut *ptr.as_ptr())
    }

    /// Runs `f` on the value with the block locked. `f` must not touch any handle of the same box.
    pub fn with<R, F>(&self, f : F) -> Result<R>
    where F : FnOnce(&T) -> R
    {
        let block = self.block().ok_or_else(Error::null_dereference)?;
        let state = block.lock();
        let ptr = state.value.ok_or_else(Error::null_dereference)?;
        // (V) the lock keeps every other sharer out
        Ok(f(unsafe { &*ptr.as_ptr() }))
    }

    pub fn with_mut<R, F>(&mut self, f : F) -> Result<R>
    where F : FnOnce(&mut T) -> R
    {
        let block = self.block().ok_or_else(Error::null_dereference)?;
        let state = block.lock();
        let ptr = state.value.ok_or_else(Error::null_dereference)?;
        Ok(f(unsafe { &mut *ptr.as_ptr() }))
    }

    fn value_ptr(&self) -> Option<NonNull<T>>
    {
        self.block().and_then(|block| block.lock().value)
    }

    /// Non-owning pointer to the current value, null if there is none.
    pub fn as_ptr(&self) -> *mut T
    {
        self.value_ptr().map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    pub fn use_count(&self) -> usize
    {
        self.block().map_or(0, |block| block.lock().owners)
    }

    pub fn has_value(&self) -> bool
    {
        self.value_ptr().is_some()
    }

    /// True if the handle has no block at all. A released box is not absent.
    pub fn is_absent(&self) -> bool
    {
        self.block.is_none()
    }

    /// True if both handles point at the same block, or both are absent.
    pub fn ptr_eq(this : &SharedBox<T>, other : &SharedBox<T>) -> bool
    {
        this.block == other.block
    }

    /// Installs `destructor` on the shared block, which changes the cleanup for every owner.
    /// Fails with `InvalidArgument` when no destructor is given; does nothing on an absent handle.
    pub fn set_destructor(&self, destructor : Option<Destructor<T>>) -> Result<()>
    {
        let destructor = destructor.ok_or_else(|| Error::invalid_argument("destructor is absent"))?;
        if let Some(block) = self.block() {
            log::debug!("replacing destructor of shared block {:p} with {:?}", block, destructor);
            block.lock().cleanup = destructor;
        }
        Ok(())
    }

    /// Takes the value out of the block for every owner. Owner counts are unchanged and the handles stay
    /// present, just without a value. The caller becomes responsible for disposing of the returned pointer.
    pub fn release(&self) -> Option<NonNull<T>>
    {
        let block = self.block()?;
        let value = block.lock().value.take();
        if let Some(value) = value {
            log::trace!("value {:p} released from shared block {:p}", value, block);
        }
        value
    }

    /// Drops this handle's reference to its block and leaves the handle absent.
    pub fn reset(&mut self)
    {
        if let Some(block) = self.block.take() {
            unsafe { SharedBlock::unshare(block) }
        }
    }
}

impl <T> Default for SharedBox<T> {
    fn default() -> SharedBox<T>
    {
        SharedBox::empty()
    }
}

impl <T> From<T> for SharedBox<T> {
    fn from(value : T) -> SharedBox<T>
    {
        SharedBox::new(value)
    }
}

impl <T> From<Box<T>> for SharedBox<T> {
    fn from(value : Box<T>) -> SharedBox<T>
    {
        SharedBox::from_box(value)
    }
}

impl <T> Clone for SharedBox<T> {
    fn clone(&self) -> SharedBox<T>
    {
        SharedBox {
            block : self.block.map(|b| unsafe { SharedBlock::share(b) }),
            _ph : PhantomData
        }
    }

    fn clone_from(&mut self, source : &SharedBox<T>)
    {
        if !SharedBox::ptr_eq(self, source) {
            *self = source.clone();
        }
    }
}

impl <T> Drop for SharedBox<T> {
    fn drop(&mut self)
    {
        self.reset();
    }
}

impl <T : fmt::Debug> fmt::Debug for SharedBox<T> {
    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.block() {
            None => f.write_str("SharedBox(<absent>)"),
            Some(block) => {
                let state = block.lock();
                let mut s = f.debug_struct("SharedBox");
                s.field("use_count", &state.owners);
                match state.value {
                    Some(ptr) => s.field("value", unsafe { &*ptr.as_ptr() }),
                    None => s.field("released", &true),
                };
                s.finish()
            }
        }
    }
}
