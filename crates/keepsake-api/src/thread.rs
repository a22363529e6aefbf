//! Flat note rows to reply forest.
//!
//! Notes arrive as a flat list ordered by creation time. [`Forest::organize`]
//! links every reply under its parent in two linear passes. The forest is an
//! arena: nodes live in one `Vec` and refer to their replies by index, so no
//! part of building, walking or dropping it recurses, however deep a thread
//! gets.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;
use uuid::Uuid;

use keepsake_types::api::{ThreadResponse, ThreadedNote};
use keepsake_types::models::Note;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub note: Note,
    /// Arena indices of direct replies, in input order.
    replies: Vec<usize>,
}

impl Node {
    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    dropped: Vec<Uuid>,
}

impl Forest {
    /// Build the forest. Siblings keep the order of `notes`.
    ///
    /// A note whose parent is missing is left out and listed in
    /// [`Forest::dropped`], together with everything beneath it. Notes caught
    /// in a parent cycle or repeating an earlier id are dropped the same way.
    pub fn organize(notes: Vec<Note>) -> Self {
        let n = notes.len();

        let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(n);
        for (i, note) in notes.iter().enumerate() {
            index.entry(note.id).or_insert(i);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut top: Vec<usize> = Vec::new();
        for (i, note) in notes.iter().enumerate() {
            if index[&note.id] != i {
                continue;
            }
            match note.parent_id {
                None => top.push(i),
                Some(parent) => match index.get(&parent) {
                    Some(&p) if p != i => children[p].push(i),
                    _ => warn!("Note {} references missing parent {}", note.id, parent),
                },
            }
        }

        // Only what hangs off a root survives
        let mut reachable = vec![false; n];
        let mut stack = top.clone();
        while let Some(i) = stack.pop() {
            if reachable[i] {
                continue;
            }
            reachable[i] = true;
            stack.extend(children[i].iter().copied().filter(|&c| !reachable[c]));
        }

        let mut slot: Vec<Option<usize>> = vec![None; n];
        let mut next = 0;
        for (i, keep) in reachable.iter().enumerate() {
            if *keep {
                slot[i] = Some(next);
                next += 1;
            }
        }

        let mut nodes = Vec::with_capacity(next);
        let mut dropped = Vec::new();
        for ((i, note), replies) in notes.into_iter().enumerate().zip(children) {
            if !reachable[i] {
                dropped.push(note.id);
                continue;
            }
            let replies = replies.into_iter().filter_map(|c| slot[c]).collect();
            nodes.push(Node { note, replies });
        }
        if !dropped.is_empty() {
            warn!("Dropped {} note(s) not attached to any thread", dropped.len());
        }

        let roots = top.into_iter().filter_map(|i| slot[i]).collect();

        Self {
            nodes,
            roots,
            dropped,
        }
    }

    /// Number of notes in the forest (dropped ones excluded).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids left out of the forest, in input order.
    pub fn dropped(&self) -> &[Uuid] {
        &self.dropped
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> + '_ {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn replies<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.replies.iter().map(|&i| &self.nodes[i])
    }

    /// Depth-first pre-order walk yielding `(depth, node)`; roots have depth 0.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            forest: self,
            stack: self.roots.iter().rev().map(|&i| (0, i)).collect(),
        }
    }

    /// Display-ordered rows for the wire.
    pub fn flatten(&self) -> Vec<ThreadedNote> {
        self.walk()
            .map(|(depth, node)| ThreadedNote {
                note: node.note.clone(),
                depth,
                reply_count: node.reply_count(),
            })
            .collect()
    }

    pub fn into_response(self) -> ThreadResponse {
        ThreadResponse {
            notes: self.flatten(),
            dropped: self.dropped,
        }
    }
}

pub struct Walk<'a> {
    forest: &'a Forest,
    stack: Vec<(usize, usize)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, i) = self.stack.pop()?;
        let node = &self.forest.nodes[i];
        self.stack
            .extend(node.replies.iter().rev().map(|&c| (depth + 1, c)));
        Some((depth, node))
    }
}

/// `root` followed by every note beneath it, breadth first. Deleting in
/// reverse order removes leaves before their parents.
pub fn subtree_ids(notes: &[Note], root: Uuid) -> Vec<Uuid> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for note in notes {
        if let Some(parent) = note.parent_id {
            children.entry(parent).or_default().push(note.id);
        }
    }

    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut ids = Vec::new();
    while let Some(id) = queue.pop_front() {
        ids.push(id);
        for &child in children.get(&id).into_iter().flatten() {
            if seen.insert(child) {
                queue.push_back(child);
            }
        }
    }
    ids
}
