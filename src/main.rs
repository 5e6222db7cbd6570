use shared_box::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn shared_assignment()
{
    let mut x = SharedBox::new(42);
    let mut y = x.clone();
    x.assign(99);
    println!("y sees {:?}, owners {}", y.with(|v| *v), y.use_count());

    y.reset();
    println!("after reset x = {:?}, y absent: {}", x, y.is_absent());
}

fn release_from_everyone()
{
    let a = SharedBox::new(String::from("payload"));
    let b = a.clone();

    if let Some(ptr) = a.release() {
        let value = unsafe { Box::from_raw(ptr.as_ptr()) };
        println!("released {:?}, a has value: {}, b has value: {}", value, a.has_value(), b.has_value());
    }
    println!("owners after release: {} {}", a.use_count(), b.use_count());
}

fn custom_destructor() -> Result<()>
{
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let destructor = Destructor::new(move |ptr : core::ptr::NonNull<Vec<u8>>| {
        counter.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(ptr.as_ptr())) }
    });

    let z = SharedBox::with_destructor(vec![1, 2, 3], Some(destructor))?;
    let w = z.clone();
    drop(z);
    println!("destructor calls while shared: {}", calls.load(Ordering::SeqCst));
    drop(w);
    println!("destructor calls after last owner: {}", calls.load(Ordering::SeqCst));

    match SharedBox::with_destructor(0u8, None) {
        Err(e) => println!("missing destructor rejected: {}", e),
        Ok(_) => unreachable!()
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    shared_assignment();
    release_from_everyone();
    custom_destructor()?;

    let absent = SharedBox::<i32>::empty();
    if let Err(e) = absent.with(|v| *v) {
        println!("{}", e);
    }
    Ok(())
}
