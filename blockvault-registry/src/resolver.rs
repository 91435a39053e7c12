//! Reference hydration.
//!
//! References are followed depth-first. The keys on the current traversal
//! path form the cycle check, so a document reachable through two distinct
//! branches (a diamond) is not a cycle. Each distinct document is loaded and
//! hydrated once per [`ReferenceResolver::hydrate`] call; later references
//! to it reuse that subtree.

use crate::error::{BlockError, BlockResult};
use crate::store::DocumentStore;
use blockvault_model::Document;
use blockvault_types::BlockKey;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Deepest reference chain hydration will follow.
pub const MAX_REFERENCE_DEPTH: usize = 32;

/// Most documents one hydrated tree may hold, counting a document once for
/// every place it appears.
pub const MAX_HYDRATED_DOCUMENTS: usize = 4096;

/// A document together with the documents its references point at, keyed
/// by the JSON pointer of each reference (`/credentials`, `/targets/0`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydratedDocument {
    pub document: Document,
    pub linked: BTreeMap<String, HydratedDocument>,
}

impl HydratedDocument {
    /// Follows `pointer` through linked documents. `""` is this document;
    /// `/db/credentials` is the `/credentials` link of the `/db` link.
    pub fn get(&self, pointer: &str) -> Option<&HydratedDocument> {
        if pointer.is_empty() {
            return Some(self);
        }
        if let Some(direct) = self.linked.get(pointer) {
            return Some(direct);
        }
        self.linked.iter().find_map(|(prefix, child)| {
            pointer
                .strip_prefix(prefix.as_str())
                .filter(|rest| rest.starts_with('/'))
                .and_then(|rest| child.get(rest))
        })
    }

    pub fn key(&self) -> BlockKey {
        self.document.key()
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Resolves references by loading their targets from a [`DocumentStore`].
pub struct ReferenceResolver<'a> {
    store: &'a DocumentStore,
}

/// A finished subtree with the measurements its reuse is checked against.
struct Subtree {
    tree: HydratedDocument,
    size: usize,
    height: usize,
}

#[derive(Default)]
struct Walk {
    path: Vec<BlockKey>,
    done: HashMap<BlockKey, Subtree>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Loads every document reachable from `document`.
    ///
    /// Fails with `CyclicReference` when a reference leads back to a
    /// document already on the current path, `NotFound` naming a missing
    /// target, and `Validation` past [`MAX_REFERENCE_DEPTH`] or
    /// [`MAX_HYDRATED_DOCUMENTS`].
    pub fn hydrate(&self, document: Document) -> BlockResult<HydratedDocument> {
        Ok(self.visit(document, &mut Walk::default())?.tree)
    }

    fn visit(&self, document: Document, walk: &mut Walk) -> BlockResult<Subtree> {
        let key = document.key();
        if walk.path.contains(&key) {
            let mut cycle = walk.path.clone();
            cycle.push(key);
            return Err(BlockError::CyclicReference { path: cycle });
        }
        let depth = walk.path.len();
        if depth >= MAX_REFERENCE_DEPTH {
            return Err(too_deep(&key));
        }

        let references: Vec<(String, BlockKey)> = document
            .references()
            .into_iter()
            .map(|(pointer, target)| (pointer, target.clone()))
            .collect();

        walk.path.push(key);
        let mut linked = BTreeMap::new();
        let mut size = 1;
        let mut height = 0;
        for (pointer, target) in references {
            let (tree, child_size, child_height) = match walk.done.get(&target) {
                Some(done) => {
                    if depth + 1 + done.height >= MAX_REFERENCE_DEPTH {
                        return Err(too_deep(&target));
                    }
                    if size + done.size > MAX_HYDRATED_DOCUMENTS {
                        return Err(too_large(&document));
                    }
                    debug!(%pointer, to = %target, "reusing hydrated reference");
                    (done.tree.clone(), done.size, done.height)
                }
                None => {
                    debug!(%pointer, to = %target, "following reference");
                    let target_doc = self.store.load_key(&target)?;
                    let done = self.visit(target_doc, walk)?;
                    let measured = (done.tree.clone(), done.size, done.height);
                    walk.done.insert(target, done);
                    measured
                }
            };
            size += child_size;
            if size > MAX_HYDRATED_DOCUMENTS {
                return Err(too_large(&document));
            }
            height = height.max(child_height + 1);
            linked.insert(pointer, tree);
        }
        walk.path.pop();

        Ok(Subtree {
            tree: HydratedDocument { document, linked },
            size,
            height,
        })
    }
}

fn too_deep(key: &BlockKey) -> BlockError {
    BlockError::invalid_document(
        &key.type_slug,
        &key.name,
        None,
        format!("reference chain deeper than {MAX_REFERENCE_DEPTH}"),
    )
}

fn too_large(document: &Document) -> BlockError {
    BlockError::invalid_document(
        &document.type_slug,
        &document.name,
        None,
        format!("references expand to more than {MAX_HYDRATED_DOCUMENTS} documents"),
    )
}
