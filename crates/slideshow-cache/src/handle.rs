use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared};

/// The outcome of a load: the decoded item, or `None` if decoding failed.
pub type LoadedItem<T> = Option<Arc<T>>;

type ItemChannel<T> = Shared<BoxFuture<'static, LoadedItem<T>>>;

/// A cloneable handle to an item that is being decoded.
///
/// All clones resolve to the same [`Arc`], and awaiting a handle never triggers another decode.
/// A handle for a suppressed request never resolves.
pub struct ItemHandle<T> {
    channel: ItemChannel<T>,
}

impl<T: Send + Sync + 'static> ItemHandle<T> {
    /// Creates a handle that resolves once `receiver` receives the item.
    ///
    /// A dropped sender resolves the handle to an empty item.
    pub(crate) fn from_receiver(receiver: oneshot::Receiver<LoadedItem<T>>) -> Self {
        let channel = receiver.map(|result| result.ok().flatten()).boxed();
        Self {
            channel: channel.shared(),
        }
    }

    /// Creates a handle that resolves immediately.
    pub fn resolved(item: LoadedItem<T>) -> Self {
        Self {
            channel: future::ready(item).boxed().shared(),
        }
    }

    /// Creates a handle that never resolves.
    pub fn never() -> Self {
        Self {
            channel: future::pending().boxed().shared(),
        }
    }

    /// Returns the item if the handle has already resolved, without blocking.
    pub fn try_get(&self) -> Option<LoadedItem<T>> {
        self.channel.clone().now_or_never()
    }

    /// Whether both handles refer to the same load.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.channel.ptr_eq(&other.channel)
    }
}

impl<T> Clone for ItemHandle<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T> fmt::Debug for ItemHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemHandle")
            .field("strong_count", &self.channel.strong_count())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Future for ItemHandle<T> {
    type Output = LoadedItem<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.channel).poll(cx)
    }
}
