use core::ptr::NonNull;
use parking_lot::{Mutex, MutexGuard};

use crate::destructor::Destructor;

// Heap state shared by every handle of one box. Handles only ever hold a NonNull to it.

//Invariant O: while a block is reachable, owners equals the number of handles pointing at it.
//Invariant D: a block is freed exactly once, by whoever moves owners from 1 to 0.
//Invariant V: value, when present, is uniquely owned by the block.

pub(crate) struct BlockState<T> {
    pub(crate) value : Option<NonNull<T>>,
    pub(crate) owners : usize,
    pub(crate) cleanup : Destructor<T>,
}

pub(crate) struct SharedBlock<T> {
    state : Mutex<BlockState<T>>,
}

impl <T> SharedBlock<T> {
    pub(crate) fn allocate(value : Option<NonNull<T>>, cleanup : Destructor<T>) -> NonNull<SharedBlock<T>>
    {
        let block = Box::new(SharedBlock {
            state : Mutex::new(BlockState { value, owners : 1, cleanup })
        });
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(block)) };
        log::trace!("shared block {:p} allocated", ptr);
        ptr
    }

    #[inline(always)]
    pub(crate) fn lock(&self) -> MutexGuard<'_, BlockState<T>>
    {
        self.state.lock()
    }

    // this must point to a live block, referenced by the caller's handle.
    pub(crate) unsafe fn share(this : NonNull<SharedBlock<T>>) -> NonNull<SharedBlock<T>>
    {
        let mut state = this.as_ref().lock();
        state.owners += 1;
        this
    }

    // this must point to a live block and the caller's handle must give up its reference with this call.
    pub(crate) unsafe fn unshare(this : NonNull<SharedBlock<T>>)
    {
        let last = {
            let mut state = this.as_ref().lock();
            debug_assert!(state.owners > 0);
            state.owners -= 1;
            state.owners == 0
        };

        if last {
            // (O) no handle is left that could lock the block again
            let block = Box::from_raw(this.as_ptr());
            let state = block.state.into_inner();
            log::trace!("shared block {:p} torn down", this);
            if let Some(value) = state.value {
                state.cleanup.dispose(value);
            }
        }
    }
}

impl <T> BlockState<T> {
    // Absorbs ptr as the new value. The previous value, if any, goes through cleanup.
    pub(crate) unsafe fn replace(&mut self, ptr : Option<NonNull<T>>)
    {
        let old = core::mem::replace(&mut self.value, ptr);
        match old {
            // absorbing the pointer already held must not free it
            Some(old) if Some(old) != ptr => {
                log::trace!("running cleanup on replaced value {:p}", old);
                self.cleanup.dispose(old);
            },
            _ => {}
        }
    }

    // Moves value into the block. An existing value is overwritten in place, so every
    // sharer observes the write.
    pub(crate) fn store(&mut self, value : T)
    {
        match self.value {
            Some(ptr) => unsafe {
                // (V)
                *ptr.as_ptr() = value;
            },
            None => self.value = Some(boxed(value)),
        }
    }

    pub(crate) fn store_from(&mut self, value : &T)
    where T : Clone
    {
        match self.value {
            Some(ptr) => unsafe {
                // (V)
                (*ptr.as_ptr()).clone_from(value);
            },
            None => self.value = Some(boxed(value.clone())),
        }
    }
}

pub(crate) fn boxed<T>(value : T) -> NonNull<T>
{
    unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(value))) }
}
