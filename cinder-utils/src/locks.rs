//! Lock aliases used throughout the workspace.
//!
//! Everything here is a synchronous `parking_lot` lock. The world engine never
//! holds one of these across an `.await`.

/// A synchronous read/write lock.
pub type SyncRwLock<T> = parking_lot::RwLock<T>;
/// A shared read guard of [`SyncRwLock`].
pub type SyncRwLockReadGuard<'a, T> = parking_lot::RwLockReadGuard<'a, T>;
/// An exclusive write guard of [`SyncRwLock`].
pub type SyncRwLockWriteGuard<'a, T> = parking_lot::RwLockWriteGuard<'a, T>;
/// A synchronous mutex.
pub type SyncMutex<T> = parking_lot::Mutex<T>;
/// A guard of [`SyncMutex`].
pub type SyncMutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
/// An owned write guard that keeps the `Arc` holding the lock alive.
pub type ArcSyncRwLockWriteGuard<T> =
    parking_lot::lock_api::ArcRwLockWriteGuard<parking_lot::RawRwLock, T>;
