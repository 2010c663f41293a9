//! Paged depth-first enumeration of the assets under a folder.

use crate::content::{Asset, ContentItem, ContentKind, Folder, Locale};
use crate::error::Result;
use crate::id::ContentId;
use crate::stop::StopToken;
use crate::store::ContentStore;
use std::collections::VecDeque;

/// One folder being expanded.
#[derive(Debug)]
struct Frame {
    folder: ContentId,
    /// Folders are listed first, then assets.
    kind: ContentKind,
    offset: usize,
    page: VecDeque<ContentItem>,
}

impl Frame {
    fn new(folder: ContentId) -> Self {
        Self {
            folder,
            kind: ContentKind::Folder,
            offset: 0,
            page: VecDeque::new(),
        }
    }
}

/// Lazy iterator over every asset below a root folder.
///
/// Child folders are descended into as soon as they are seen, so subfolders
/// are finished before the assets of their parent. Children are fetched
/// `page_size` at a time and only the current page of each open folder is
/// held in memory. Children whose parent is not the folder being expanded
/// (shared or linked items) are skipped.
///
/// The stop token is checked before every page request; once it is set the
/// iterator ends. A store error is yielded once and ends the walk.
///
/// Paging is offset based, so a caller that deletes yielded assets while the
/// walk is running must report them through
/// [`AssetWalker::children_removed`] or the following page skips over the
/// children that moved up.
pub struct AssetWalker<'a, S: ContentStore + ?Sized> {
    store: &'a S,
    locale: Locale,
    page_size: usize,
    stop: StopToken,
    stack: Vec<Frame>,
    pages_fetched: usize,
}

impl<'a, S: ContentStore + ?Sized> AssetWalker<'a, S> {
    /// Start a walk at `root`.
    pub fn new(
        store: &'a S,
        root: ContentId,
        locale: Locale,
        page_size: usize,
        stop: StopToken,
    ) -> Self {
        Self {
            store,
            locale,
            page_size: page_size.max(1),
            stop,
            stack: vec![Frame::new(root)],
            pages_fetched: 0,
        }
    }

    /// Number of listing pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Account for `count` yielded assets of `folder` that were deleted from
    /// the store.
    ///
    /// Only an open asset listing is affected; deletions under folders that
    /// are already closed are ignored.
    pub fn children_removed(&mut self, folder: &ContentId, count: usize) {
        if let Some(frame) = self
            .stack
            .iter_mut()
            .rev()
            .find(|frame| frame.kind == ContentKind::Asset && frame.folder.same_item(folder))
        {
            frame.offset = frame.offset.saturating_sub(count);
        }
    }

    /// Fetch the next page for the top frame. Returns false when the frame
    /// had nothing left of the current kind.
    fn fill_page(&mut self) -> Result<bool> {
        let Some(frame) = self.stack.last_mut() else {
            return Ok(false);
        };

        let items = self.store.children(
            &frame.folder,
            frame.kind,
            &self.locale,
            frame.offset,
            self.page_size,
        )?;
        self.pages_fetched += 1;

        tracing::trace!(
            folder = %frame.folder,
            kind = %frame.kind,
            offset = frame.offset,
            count = items.len(),
            "Fetched child page"
        );

        if items.is_empty() {
            return Ok(false);
        }

        frame.offset += self.page_size;
        let folder = frame.folder;
        let kind = frame.kind;
        frame.page.extend(
            items
                .into_iter()
                .filter(|item| item.kind == kind && item.parent.same_item(&folder)),
        );
        Ok(true)
    }
}

impl<S: ContentStore + ?Sized> Iterator for AssetWalker<'_, S> {
    type Item = Result<Asset>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let kind = frame.kind;

            if let Some(item) = frame.page.pop_front() {
                match kind {
                    ContentKind::Folder => {
                        if let Some(folder) = Folder::from_item(item) {
                            self.stack.push(Frame::new(folder.id));
                        }
                    }
                    ContentKind::Asset => {
                        if let Some(asset) = Asset::from_item(item) {
                            return Some(Ok(asset));
                        }
                    }
                }
                continue;
            }

            if self.stop.is_stopped() {
                tracing::debug!("Stop requested, ending walk");
                self.stack.clear();
                return None;
            }

            match self.fill_page() {
                Ok(true) => {}
                Ok(false) => {
                    // Current kind exhausted: move on to assets, or close the folder.
                    if kind == ContentKind::Folder {
                        if let Some(frame) = self.stack.last_mut() {
                            frame.kind = ContentKind::Asset;
                            frame.offset = 0;
                        }
                    } else {
                        self.stack.pop();
                    }
                }
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Walk every asset below `root`.
pub fn walk<'a, S: ContentStore + ?Sized>(
    store: &'a S,
    root: ContentId,
    locale: Locale,
    page_size: usize,
    stop: StopToken,
) -> AssetWalker<'a, S> {
    AssetWalker::new(store, root, locale, page_size, stop)
}
