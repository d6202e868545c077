//! # Call Adapters
//!
//! A call adapter is a method plus a snapshot of its arguments, packaged so a
//! worker can run it without knowing anything about the method ahead of time.
//! Adapters are boxed, moved into an Invoke packet, and consumed on the worker
//! thread by [`CallAdapter::invoke`], which takes `self: Box<Self>` so the
//! adapter is freed exactly once, right after the call, whichever way the call
//! ends.
//!
//! Plain method paths work directly:
//!
//! ```rust
//! use relay::thread::call::{CallAdapter, MethodCall};
//!
//! struct Counter { total: u64 }
//!
//! impl Counter {
//!     fn add(&mut self, amount: u64, times: u64) {
//!         self.total += amount * times;
//!     }
//! }
//!
//! let call: Box<dyn CallAdapter<Counter>> =
//!     Box::new(MethodCall::<Counter, _, _>::new(Counter::add, (3u64, 4u64)));
//! let mut counter = Counter { total: 0 };
//! call.invoke(&mut counter);
//! assert_eq!(counter.total, 12);
//! ```

use std::marker::PhantomData;

/// Boxed adapter for worker type `W`.
pub type BoxedCall<W> = Box<dyn CallAdapter<W>>;

/// Something that can be run once against a worker.
pub trait CallAdapter<W>: Send {
    /// Runs the call against `target`, consuming the adapter.
    fn invoke(self: Box<Self>, target: &mut W);

    /// Name used in logs.
    fn describe(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A callable that takes a worker plus an argument tuple.
///
/// Implemented for every `FnOnce(&mut W, A1, .., An) + Send + 'static` with up
/// to six arguments, which covers method paths such as `Recorder::record`.
pub trait Method<W, Args>: Send + 'static {
    fn call(self, target: &mut W, args: Args);
}

macro_rules! impl_method {
    ($($arg:ident),*) => {
        impl<W, F, $($arg,)*> Method<W, ($($arg,)*)> for F
        where
            F: FnOnce(&mut W, $($arg),*) + Send + 'static,
        {
            #[allow(non_snake_case)]
            fn call(self, target: &mut W, ($($arg,)*): ($($arg,)*)) {
                (self)(target, $($arg),*)
            }
        }
    };
}

impl_method!();
impl_method!(A1);
impl_method!(A1, A2);
impl_method!(A1, A2, A3);
impl_method!(A1, A2, A3, A4);
impl_method!(A1, A2, A3, A4, A5);
impl_method!(A1, A2, A3, A4, A5, A6);

/// A bound method and its arguments, captured by value.
pub struct MethodCall<W, F, Args> {
    method: F,
    args: Args,
    _target: PhantomData<fn(&mut W)>,
}

impl<W, F, Args> MethodCall<W, F, Args>
where
    F: Method<W, Args>,
{
    pub fn new(method: F, args: Args) -> Self {
        Self {
            method,
            args,
            _target: PhantomData,
        }
    }
}

impl<W, F, Args> CallAdapter<W> for MethodCall<W, F, Args>
where
    F: Method<W, Args>,
    Args: Send + 'static,
{
    fn invoke(self: Box<Self>, target: &mut W) {
        let MethodCall { method, args, .. } = *self;
        Method::call(method, target, args);
    }

    fn describe(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

/// A closure over the worker, for calls that don't map onto one method.
pub struct ClosureCall<F>(F);

impl<F> ClosureCall<F> {
    pub fn new(closure: F) -> Self {
        Self(closure)
    }
}

impl<W, F> CallAdapter<W> for ClosureCall<F>
where
    F: FnOnce(&mut W) + Send + 'static,
{
    fn invoke(self: Box<Self>, target: &mut W) {
        (self.0)(target)
    }

    fn describe(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}
