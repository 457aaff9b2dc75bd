//! B+Tree node definitions and their on-page codec.

use bincode::config::{self, Config};
use common::{DbResult, PageId, RecordId, INVALID_PAGE_ID};
use serde::{Deserialize, Serialize};

/// The type of a B+Tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Internal,
    Leaf,
}

/// A B+Tree node, either internal or leaf. Keys are already schema-encoded
/// fixed-width byte strings, so the node itself never needs a comparator to
/// decode anything -- `Ord` on `Vec<u8>` is enough to keep entries sorted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BTreeNode {
    /// Internal node with separator keys and child pointers: `keys.len() +
    /// 1 == children.len()`.
    Internal {
        keys: Vec<Vec<u8>>,
        children: Vec<PageId>,
    },
    /// Leaf node with sorted key/RecordId entries, chained to its right
    /// sibling for range scans.
    Leaf {
        entries: Vec<(Vec<u8>, RecordId)>,
        next_leaf: PageId,
    },
}

impl BTreeNode {
    pub fn new_leaf() -> Self {
        Self::Leaf {
            entries: Vec::new(),
            next_leaf: INVALID_PAGE_ID,
        }
    }

    pub fn new_internal(keys: Vec<Vec<u8>>, children: Vec<PageId>) -> Self {
        Self::Internal { keys, children }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Internal { .. } => NodeType::Internal,
            Self::Leaf { .. } => NodeType::Leaf,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Number of keys (internal) or entries (leaf).
    pub fn len(&self) -> usize {
        match self {
            Self::Internal { keys, .. } => keys.len(),
            Self::Leaf { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn node_codec_config() -> impl Config {
    config::legacy()
}

/// Serializes a node into a fixed `page_size`-byte buffer, prefixed with its
/// encoded length so a short read can be detected.
pub fn encode_node(node: &BTreeNode, page_size: usize) -> DbResult<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(node, node_codec_config())
        .map_err(|e| common::DbError::Storage(format!("encode node: {e}")))?;
    if body.len() + 8 > page_size {
        return Err(common::DbError::Storage(format!(
            "node does not fit in a {page_size} byte page (needs {})",
            body.len() + 8
        )));
    }
    let mut buf = vec![0u8; page_size];
    buf[0..8].copy_from_slice(&(body.len() as u64).to_le_bytes());
    buf[8..8 + body.len()].copy_from_slice(&body);
    Ok(buf)
}

pub fn decode_node(bytes: &[u8]) -> DbResult<BTreeNode> {
    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[0..8]);
    let len = u64::from_le_bytes(len_buf) as usize;
    let (node, _) =
        bincode::serde::decode_from_slice(&bytes[8..8 + len], node_codec_config())
            .map_err(|e| common::DbError::Storage(format!("decode node: {e}")))?;
    Ok(node)
}

/// On-page layout of the header page: just the root pointer. Kept separate
/// from `BTreeNode` since it is never a tree node itself.
pub fn encode_root_pointer(root_page_id: PageId, page_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; page_size];
    buf[0..8].copy_from_slice(&root_page_id.0.to_le_bytes());
    buf
}

pub fn decode_root_pointer(bytes: &[u8]) -> PageId {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[0..8]);
    PageId(u64::from_le_bytes(buf))
}
