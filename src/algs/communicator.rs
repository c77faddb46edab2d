//! Thin façade over intra-process (threaded) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Receive handles are **waitable**: the collectives in
//! [`consolidate`](crate::algs::consolidate) call `.wait()` before they trust
//! that a buffer is ready.
//!
//! A communicator is the explicit execution context of a rank: it carries the
//! rank id, the rank count and the transport used by collectives. Nothing in
//! this crate reaches for an ambient "world" handle.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Point-to-point communication interface.
///
/// Messages between the same `(src, dst, tag)` triple are delivered in the
/// order they were sent.
///
/// There are no collective primitives here. The variable-count gather and
/// the root broadcast in [`Consolidator`](crate::algs::consolidate::Consolidator)
/// are built from tagged `isend`/`irecv` pairs to and from the root. The root
/// posts one spare byte per peer, so an oversized contribution is reported
/// rather than truncated.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes; longer messages are truncated.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Zero-based id of this rank.
    fn rank(&self) -> usize;
    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// True for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Typed message tag. Collectives derive the tags of their stages with
/// [`CommTag::offset`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(base: u16) -> Self {
        CommTag(base)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tags used by [`Consolidator`](crate::algs::consolidate::Consolidator).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConsolidateTags {
    /// Per-rank owned values flowing to root.
    pub gather: CommTag,
    /// Global arrays flowing back from root.
    pub scatter: CommTag,
}

impl ConsolidateTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            gather: base,
            scatter: base.offset(1),
        }
    }
}

impl Default for ConsolidateTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x4700))
    }
}

/// Compile-time no-op comm for single-rank runs and serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- ThreadComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = Arc<DashMap<Key, VecDeque<Bytes>>>;

/// In-process communicator: every rank of a world shares one FIFO mailbox.
///
/// Build a world with [`ThreadComm::world`] and move each handle into its own
/// thread. Receives spin (yielding) until the matching send arrives, so a rank
/// that never sends blocks its peer forever, just like a real collective.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Mailbox,
}

impl ThreadComm {
    /// Create `size` connected ranks.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mailbox: Mailbox = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

pub struct LocalHandle {
    mailbox: Mailbox,
    key: Key,
    max_len: usize,
}

impl LocalHandle {
    fn try_take(&self) -> Option<Bytes> {
        self.mailbox
            .get_mut(&self.key)
            .and_then(|mut queue| queue.pop_front())
    }
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(bytes) = self.try_take() {
                let n = bytes.len().min(self.max_len);
                return Some(bytes[..n].to_vec());
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            max_len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::mesh_error::MeshRegridError;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, Destination, Source};

    /// MPI world communicator. Sends use standard mode and receives complete
    /// when posted, so `irecv` returns an already-finished handle.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, MeshRegridError> {
            let universe = mpi::initialize().ok_or_else(|| MeshRegridError::CommError {
                neighbor: 0,
                source: "MPI was already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }

        /// Abort every rank of the job. Fatal errors go through here so no
        /// rank is left waiting in a collective.
        pub fn abort(&self, code: i32) -> ! {
            self.world.abort(code)
        }
    }

    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag as i32);
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            MpiHandle(Some(data[..n].to_vec()))
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_single_rank() {
        let comm = NoComm;
        assert!(comm.is_no_comm());
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        let mut buf = [0u8; 4];
        assert!(comm.irecv(0, 1, &mut buf).wait().is_none());
    }

    #[test]
    fn thread_roundtrip_two_ranks() {
        let world = ThreadComm::world(2);
        let (comm0, comm1) = (&world[0], &world[1]);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        comm0.isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn thread_fifo_per_tag() {
        let world = ThreadComm::world(2);
        for i in 0..5u8 {
            world[0].isend(1, 3, &[i]);
        }
        world[0].isend(1, 4, &[99]);
        let mut b = [0u8; 1];
        assert_eq!(world[1].irecv(0, 4, &mut b).wait(), Some(vec![99]));
        let got: Vec<u8> = (0..5)
            .map(|_| world[1].irecv(0, 3, &mut b).wait().unwrap()[0])
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn worlds_are_isolated() {
        let a = ThreadComm::world(2);
        let b = ThreadComm::world(2);
        a[0].isend(1, 9, &[1]);
        b[0].isend(1, 9, &[2]);
        let mut buf = [0u8; 1];
        assert_eq!(b[1].irecv(0, 9, &mut buf).wait(), Some(vec![2]));
        assert_eq!(a[1].irecv(0, 9, &mut buf).wait(), Some(vec![1]));
    }

    #[test]
    fn consolidate_tags_are_distinct() {
        let tags = ConsolidateTags::from_base(CommTag::new(0x10));
        assert_eq!(tags.gather.as_u16(), 0x10);
        assert_eq!(tags.scatter.as_u16(), 0x11);
    }
}
