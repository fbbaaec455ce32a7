use core::fmt;
use core::num::NonZeroU32;

/// Position of a node or pipe in the network arenas.
///
/// Ids are handed out in insertion order by the network builder, so
/// `idx()` doubles as the row or column of that entity in the coupling
/// matrix and in every per-node / per-pipe vector of the solver.
/// The value is stored off by one, which lets `Option<Id>` (the optional
/// reference and gap-filling nodes) stay four bytes wide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Id of the entity at arena position `index`.
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    /// Arena position as stored.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// Arena position, for slicing.
    #[inline]
    pub fn idx(self) -> usize {
        self.index() as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Junction of the network (feeder, consumer or plain branch point).
pub type NodeId = Id;
/// Pipe between two nodes; forerun and return share the same id.
pub type PipeId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_position_is_preserved() {
        for i in [0_u32, 1, 7, 4_096] {
            let id = NodeId::from_index(i);
            assert_eq!(id.index(), i);
            assert_eq!(id.idx(), i as usize);
        }
    }

    #[test]
    fn ids_order_by_insertion() {
        let ids: Vec<PipeId> = (0..5).map(PipeId::from_index).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(format!("{} {:?}", ids[3], ids[3]), "3 #3");
    }

    #[test]
    fn optional_node_costs_nothing() {
        assert_eq!(
            core::mem::size_of::<NodeId>(),
            core::mem::size_of::<Option<NodeId>>()
        );
    }
}
