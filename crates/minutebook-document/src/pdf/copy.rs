// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page copier — moves source pages into a fresh output document without
// touching their content.
//
// Content streams keep their original (possibly still compressed) bytes and
// filters. Each source object is copied at most once: a remap table from
// source id to output id makes shared resources stay shared and turns cycles
// (annotation /P back-pointers, link destinations) into plain references.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use minutebook_core::error::MinutebookError;
use tracing::{debug, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic /Parent chains.
const MAX_TREE_DEPTH: usize = 64;

/// Copies pages from one parsed source into one output document.
///
/// The remap table is only meaningful for a single output, so build a fresh
/// copier per composition.
pub struct PageCopier<'a> {
    source: &'a Document,
    remap: BTreeMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    pub fn new(source: &'a Document) -> Self {
        Self {
            source,
            remap: BTreeMap::new(),
        }
    }

    /// Copy the page `page_id` into `target` under the page-tree node
    /// `parent_id`, returning the page's id in `target`.
    ///
    /// Inherited attributes are written onto the copy so the page renders the
    /// same once detached from its original page tree.
    pub fn copy_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent_id: ObjectId,
    ) -> Result<ObjectId, MinutebookError> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            MinutebookError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

        // The page may already have been reached through a link from an
        // earlier page; reuse its slot so those references stay valid.
        let new_id = self.reserve(target, page_id);

        let mut copied = self.copy_dictionary(target, page)?;
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = self.inherited(page, key) {
                let value = self.copy_object(target, &value)?;
                copied.set(key.to_vec(), value);
            }
        }
        copied.set("Parent", Object::Reference(parent_id));

        target.objects.insert(new_id, Object::Dictionary(copied));
        debug!(?page_id, ?new_id, "page copied");
        Ok(new_id)
    }

    /// Number of distinct source objects copied so far.
    pub fn copied_objects(&self) -> usize {
        self.remap.len()
    }

    fn reserve(&mut self, target: &mut Document, source_id: ObjectId) -> ObjectId {
        *self
            .remap
            .entry(source_id)
            .or_insert_with(|| target.new_object_id())
    }

    /// Walk the /Parent chain looking for an inherited attribute.
    fn inherited(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut current = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;
        while let Some(node_id) = current {
            if depth >= MAX_TREE_DEPTH {
                warn!(?node_id, "page tree deeper than expected, stopping inheritance walk");
                return None;
            }
            let node = self.source.get_dictionary(node_id).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            current = node.get(b"Parent").and_then(Object::as_reference).ok();
            depth += 1;
        }
        None
    }

    fn copy_reference(
        &mut self,
        target: &mut Document,
        source_id: ObjectId,
    ) -> Result<Object, MinutebookError> {
        if let Some(&existing) = self.remap.get(&source_id) {
            return Ok(Object::Reference(existing));
        }

        let source = self.source;
        let referenced = match source.get_object(source_id) {
            Ok(object) => object,
            Err(err) => {
                warn!(?source_id, %err, "cannot resolve reference, using Null");
                return Ok(Object::Null);
            }
        };

        // Page-tree interior nodes belong to the source's structure, not to
        // any page; never drag the whole tree along.
        if is_type(referenced, b"Pages") {
            return Ok(Object::Null);
        }

        let new_id = self.reserve(target, source_id);
        let copied = self.copy_object(target, referenced)?;
        target.objects.insert(new_id, copied);
        Ok(Object::Reference(new_id))
    }

    fn copy_dictionary(
        &mut self,
        target: &mut Document,
        dict: &Dictionary,
    ) -> Result<Dictionary, MinutebookError> {
        let skip_parent = is_page_node(dict);
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if skip_parent && key == b"Parent" {
                continue;
            }
            out.set(key.clone(), self.copy_object(target, value)?);
        }
        Ok(out)
    }

    fn copy_object(
        &mut self,
        target: &mut Document,
        object: &Object,
    ) -> Result<Object, MinutebookError> {
        match object {
            Object::Reference(id) => self.copy_reference(target, *id),
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.copy_dictionary(target, dict)?)),
            Object::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.copy_object(target, item)?);
                }
                Ok(Object::Array(out))
            }
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dictionary(target, &stream.dict)?;
                Ok(Object::Stream(copied))
            }
            other => Ok(other.clone()),
        }
    }
}

fn is_page_node(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Page" || name == b"Pages")
}

fn is_type(object: &Object, wanted: &[u8]) -> bool {
    match object {
        Object::Dictionary(dict) => {
            matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == wanted)
        }
        _ => false,
    }
}
