//! Strongly-typed identifiers.
//!
//! ULID ベースの ID を Phantom type パターンで型ごとに分けています。
//! - `WorkerId`: ワーカーの 1 incarnation（再起動のたびに新しい ID）
//! - `CommandId`: 1 件の status command
//!
//! ULID は時刻順にソートできるので、ログ上で incarnation の前後関係がそのまま読めます。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"worker-", "cmd-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は実行時にはメモリを消費しないマーカーで、
/// `WorkerId` と `CommandId` を混同できないようにするためだけに存在します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// 現在時刻から新しい ID を生成
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Worker のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Worker {}

impl IdMarker for Worker {
    fn prefix() -> &'static str {
        "worker-"
    }
}

/// Command のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {}

impl IdMarker for Command {
    fn prefix() -> &'static str {
        "cmd-"
    }
}

/// Identifier of one worker incarnation.
pub type WorkerId = Id<Worker>;

/// Identifier of one status command.
pub type CommandId = Id<Command>;
