// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size block allocator and the `Message` records chained over it
//! (`SPEC_FULL.md` §3, §4.2).
//!
//! Blocks and messages both live in fixed-size arenas addressed by index
//! (`u16`), each with its own free list threaded through the unused slots —
//! the index-arena strategy recorded in `DESIGN.md` for the spec's raw
//! linked-list types. A [`MessageId`] is just an arena index plus the
//! generation it was allocated under, so a stale handle used after `Free()`
//! is rejected rather than silently aliasing a reused slot.

use core::cell::RefCell;

use crate::error::{Result, ThreadError};

/// Payload bytes per block, matching `SPEC_FULL.md` §3 ("≈128 bytes each").
pub const BLOCK_SIZE: usize = 128;

/// Total blocks in the pool. Fixed at compile time: "All allocation is from
/// fixed-size, bounded pools" (`SPEC_FULL.md` §5).
pub const NUM_BLOCKS: usize = 64;

/// Total concurrently-live messages.
pub const NUM_MESSAGES: usize = 24;

/// Largest headroom a caller may reserve in `NewMessage`. Reserved bytes are
/// carved out of the first block only, which keeps `Prepend` a pure
/// cursor-shift with no copy; this is comfortably larger than the deepest
/// header stack this crate builds (mesh + 6LoWPAN + MAC auxiliary security).
pub const MAX_RESERVED: usize = BLOCK_SIZE - 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    Ip6,
    SixLowpanFragment,
    MacData,
    Raw,
}

#[derive(Clone, Copy)]
struct Block {
    data: [u8; BLOCK_SIZE],
    /// Next block in this message's chain, or (when free) the next free
    /// block; `None` terminates either list.
    next: Option<u16>,
}

impl Block {
    const fn empty() -> Self {
        Self {
            data: [0; BLOCK_SIZE],
            next: None,
        }
    }
}

#[derive(Clone, Copy)]
struct MessageSlot {
    in_use: bool,
    generation: u16,
    first_block: Option<u16>,
    /// Bytes of headroom still unused at the front of `first_block`.
    headroom: u16,
    reserved: u16,
    length: u32,
    offset: u32,
    msg_type: MessageType,
    datagram_tag: u16,
    timeout: u32,
    link_security: bool,
    on_queue: bool,
    /// Next message in whatever [`super::queue::MessageQueue`] this message
    /// currently belongs to.
    queue_next: Option<u16>,
    /// Next free message slot, when `!in_use`.
    free_next: Option<u16>,
}

impl MessageSlot {
    const fn empty() -> Self {
        Self {
            in_use: false,
            generation: 0,
            first_block: None,
            headroom: 0,
            reserved: 0,
            length: 0,
            offset: 0,
            msg_type: MessageType::Raw,
            datagram_tag: 0,
            timeout: 0,
            link_security: false,
            on_queue: false,
            queue_next: None,
            free_next: None,
        }
    }
}

/// A handle to a live message. Stable across pool mutation; becomes invalid
/// (all operations return `InvalidArgs`) once `Free()` is called.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MessageId {
    index: u16,
    generation: u16,
}

struct Inner {
    blocks: [Block; NUM_BLOCKS],
    free_block_head: Option<u16>,
    free_blocks: usize,
    messages: [MessageSlot; NUM_MESSAGES],
    free_message_head: Option<u16>,
}

impl Inner {
    fn new() -> Self {
        let mut blocks = [Block::empty(); NUM_BLOCKS];
        for i in 0..NUM_BLOCKS - 1 {
            blocks[i].next = Some(i as u16 + 1);
        }
        let mut messages = [MessageSlot::empty(); NUM_MESSAGES];
        for i in 0..NUM_MESSAGES - 1 {
            messages[i].free_next = Some(i as u16 + 1);
        }
        Self {
            blocks,
            free_block_head: Some(0),
            free_blocks: NUM_BLOCKS,
            messages,
            free_message_head: Some(0),
        }
    }

    fn alloc_block(&mut self) -> Result<u16> {
        match self.free_block_head {
            Some(idx) => {
                self.free_block_head = self.blocks[idx as usize].next;
                self.blocks[idx as usize].next = None;
                self.blocks[idx as usize].data = [0; BLOCK_SIZE];
                self.free_blocks -= 1;
                Ok(idx)
            }
            None => Err(ThreadError::NoBufs),
        }
    }

    fn free_block(&mut self, idx: u16) {
        self.blocks[idx as usize].next = self.free_block_head;
        self.free_block_head = Some(idx);
        self.free_blocks += 1;
    }

    fn free_chain(&mut self, head: Option<u16>) {
        let mut cur = head;
        while let Some(idx) = cur {
            let next = self.blocks[idx as usize].next;
            self.free_block(idx);
            cur = next;
        }
    }

    fn chain_len_blocks(&self, mut head: Option<u16>) -> usize {
        let mut n = 0;
        while let Some(idx) = head {
            n += 1;
            head = self.blocks[idx as usize].next;
        }
        n
    }

    fn nth_block(&self, mut head: Option<u16>, mut n: usize) -> Option<u16> {
        while n > 0 {
            head = self.blocks[head?].next;
            n -= 1;
        }
        head
    }

    fn slot(&self, id: MessageId) -> Result<&MessageSlot> {
        let slot = &self.messages[id.index as usize];
        if slot.in_use && slot.generation == id.generation {
            Ok(slot)
        } else {
            Err(ThreadError::InvalidArgs)
        }
    }

    fn slot_mut(&mut self, id: MessageId) -> Result<&mut MessageSlot> {
        let slot = &mut self.messages[id.index as usize];
        if slot.in_use && slot.generation == id.generation {
            Ok(slot)
        } else {
            Err(ThreadError::InvalidArgs)
        }
    }
}

/// Fixed-count block allocator plus the message arena built over it
/// (`SPEC_FULL.md` §4.2). Single `RefCell` inside: this crate never suspends
/// inside a handler, so a borrow can never outlive a single call.
pub struct MessagePool {
    inner: RefCell<Inner>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner::new()),
        }
    }

    /// How many blocks are currently unallocated.
    pub fn free_blocks(&self) -> usize {
        self.inner.borrow().free_blocks
    }

    /// `NewMessage(reserved_header_bytes)`: allocates one block, carving
    /// `reserved_header_bytes` of headroom out of its front so a later
    /// `Prepend` needs no copy.
    pub fn new_message(&self, reserved_header_bytes: usize, msg_type: MessageType) -> Result<MessageId> {
        if reserved_header_bytes > MAX_RESERVED {
            return Err(ThreadError::InvalidArgs);
        }
        let mut inner = self.inner.borrow_mut();
        let message_index = inner.free_message_head.ok_or(ThreadError::NoBufs)?;
        let block_index = inner.alloc_block()?;
        inner.free_message_head = inner.messages[message_index as usize].free_next;

        let generation = inner.messages[message_index as usize].generation.wrapping_add(1);
        inner.messages[message_index as usize] = MessageSlot {
            in_use: true,
            generation,
            first_block: Some(block_index),
            headroom: reserved_header_bytes as u16,
            reserved: reserved_header_bytes as u16,
            length: 0,
            offset: 0,
            msg_type,
            datagram_tag: 0,
            timeout: 0,
            link_security: false,
            on_queue: false,
            queue_next: None,
            free_next: None,
        };
        Ok(MessageId {
            index: message_index,
            generation,
        })
    }

    pub fn message_type(&self, id: MessageId) -> Result<MessageType> {
        Ok(self.inner.borrow().slot(id)?.msg_type)
    }

    pub fn length(&self, id: MessageId) -> Result<u32> {
        Ok(self.inner.borrow().slot(id)?.length)
    }

    pub fn offset(&self, id: MessageId) -> Result<u32> {
        Ok(self.inner.borrow().slot(id)?.offset)
    }

    pub fn datagram_tag(&self, id: MessageId) -> Result<u16> {
        Ok(self.inner.borrow().slot(id)?.datagram_tag)
    }

    pub fn set_datagram_tag(&self, id: MessageId, tag: u16) -> Result<()> {
        self.inner.borrow_mut().slot_mut(id)?.datagram_tag = tag;
        Ok(())
    }

    pub fn timeout(&self, id: MessageId) -> Result<u32> {
        Ok(self.inner.borrow().slot(id)?.timeout)
    }

    pub fn set_timeout(&self, id: MessageId, timeout: u32) -> Result<()> {
        self.inner.borrow_mut().slot_mut(id)?.timeout = timeout;
        Ok(())
    }

    pub fn link_security(&self, id: MessageId) -> Result<bool> {
        Ok(self.inner.borrow().slot(id)?.link_security)
    }

    pub fn set_link_security(&self, id: MessageId, secure: bool) -> Result<()> {
        self.inner.borrow_mut().slot_mut(id)?.link_security = secure;
        Ok(())
    }

    pub fn is_on_queue(&self, id: MessageId) -> Result<bool> {
        Ok(self.inner.borrow().slot(id)?.on_queue)
    }

    /// `SetOffset(x)`: cursor only, never changes length.
    pub fn set_offset(&self, id: MessageId, offset: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let length = inner.slot(id)?.length;
        if offset > length {
            return Err(ThreadError::InvalidArgs);
        }
        inner.slot_mut(id)?.offset = offset;
        Ok(())
    }

    /// `MoveOffset(dx)`: relative cursor move, clamped to `[0, length]` by
    /// rejecting any move that would leave that range.
    pub fn move_offset(&self, id: MessageId, dx: i32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let slot = inner.slot(id)?;
        let new_offset = slot.offset as i64 + dx as i64;
        if new_offset < 0 || new_offset > slot.length as i64 {
            return Err(ThreadError::InvalidArgs);
        }
        inner.slot_mut(id)?.offset = new_offset as u32;
        Ok(())
    }

    /// `SetLength(n)`: truncates or grows, allocating new blocks as needed.
    pub fn set_length(&self, id: MessageId, n: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let (first_block, headroom, old_length) = {
            let slot = inner.slot(id)?;
            (slot.first_block, slot.headroom, slot.length)
        };
        let cur_blocks = inner.chain_len_blocks(first_block);
        if n < old_length {
            // Shrink: free any now-unneeded trailing blocks.
            let needed_blocks = blocks_needed(n, headroom);
            if needed_blocks < cur_blocks {
                if let Some(last_kept) = inner.nth_block(first_block, needed_blocks - 1) {
                    let tail = inner.blocks[last_kept as usize].next;
                    inner.blocks[last_kept as usize].next = None;
                    inner.free_chain(tail);
                }
            }
            inner.slot_mut(id)?.length = n;
            let slot = inner.slot_mut(id)?;
            if slot.offset > n {
                slot.offset = n;
            }
            return Ok(());
        }
        if n == old_length {
            return Ok(());
        }
        // Grow.
        let needed_blocks = blocks_needed(n, headroom);
        while inner.chain_len_blocks(first_block) < needed_blocks {
            let new_block = inner.alloc_block()?;
            let last = inner.nth_block(first_block, inner.chain_len_blocks(first_block) - 1);
            match last {
                Some(idx) => inner.blocks[idx as usize].next = Some(new_block),
                None => unreachable!("new_message always allocates the first block"),
            }
        }
        inner.slot_mut(id)?.length = n;
        Ok(())
    }

    /// `Append(bytes)`: extends `length` by `bytes.len()`, writing at the
    /// current end of the chain.
    pub fn append(&self, id: MessageId, bytes: &[u8]) -> Result<()> {
        let old_length = self.length(id)?;
        self.set_length(id, old_length + bytes.len() as u32)?;
        self.write(id, old_length, bytes)?;
        Ok(())
    }

    /// `Prepend(bytes)`: consumes headroom reserved at `NewMessage` time,
    /// writing immediately before the previous start of the content.
    pub fn prepend(&self, id: MessageId, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let (first_block, headroom) = {
            let slot = inner.slot(id)?;
            (slot.first_block.unwrap(), slot.headroom)
        };
        if bytes.len() > headroom as usize {
            return Err(ThreadError::NoBufs);
        }
        let new_headroom = headroom as usize - bytes.len();
        let block = &mut inner.blocks[first_block as usize];
        block.data[new_headroom..new_headroom + bytes.len()].copy_from_slice(bytes);
        let slot = inner.slot_mut(id)?;
        slot.headroom = new_headroom as u16;
        slot.length += bytes.len() as u32;
        Ok(())
    }

    /// `Read(offset, n, dst)`: returns the number of bytes actually copied,
    /// short of `n` if `offset + n` runs past `length`.
    pub fn read(&self, id: MessageId, offset: u32, dst: &mut [u8]) -> Result<usize> {
        let inner = self.inner.borrow();
        let slot = inner.slot(id)?;
        if offset > slot.length {
            return Ok(0);
        }
        let avail = (slot.length - offset) as usize;
        let want = dst.len().min(avail);
        let mut written = 0usize;
        let start_byte = slot.headroom as usize + offset as usize;
        let (block_skip, mut in_block_off) = (start_byte / BLOCK_SIZE, start_byte % BLOCK_SIZE);
        let mut cur = inner.nth_block(slot.first_block, block_skip);
        while written < want {
            let idx = cur.ok_or(ThreadError::Failed)?;
            let block = &inner.blocks[idx as usize];
            let take = (BLOCK_SIZE - in_block_off).min(want - written);
            dst[written..written + take].copy_from_slice(&block.data[in_block_off..in_block_off + take]);
            written += take;
            in_block_off = 0;
            cur = block.next;
        }
        Ok(written)
    }

    /// `Write(offset, n, src)`: writes within the current `length`; callers
    /// must `SetLength`/`Append` first to grow.
    pub fn write(&self, id: MessageId, offset: u32, src: &[u8]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let slot = *inner.slot(id)?;
        if offset as u64 + src.len() as u64 > slot.length as u64 {
            return Err(ThreadError::InvalidArgs);
        }
        let start_byte = slot.headroom as usize + offset as usize;
        let (block_skip, mut in_block_off) = (start_byte / BLOCK_SIZE, start_byte % BLOCK_SIZE);
        let mut cur = inner.nth_block(slot.first_block, block_skip);
        let mut written = 0usize;
        while written < src.len() {
            let idx = cur.ok_or(ThreadError::Failed)?;
            let take = (BLOCK_SIZE - in_block_off).min(src.len() - written);
            {
                let block = &mut inner.blocks[idx as usize];
                block.data[in_block_off..in_block_off + take]
                    .copy_from_slice(&src[written..written + take]);
            }
            written += take;
            in_block_off = 0;
            cur = inner.blocks[idx as usize].next;
        }
        Ok(())
    }

    /// `Free()`: returns every block in the chain to the pool. Rejects
    /// messages still linked into a queue, matching §4.2's contract.
    pub fn free(&self, id: MessageId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        {
            let slot = inner.slot(id)?;
            if slot.on_queue {
                return Err(ThreadError::InvalidState);
            }
        }
        let first_block = inner.slot(id)?.first_block;
        inner.free_chain(first_block);
        let slot = &mut inner.messages[id.index as usize];
        slot.in_use = false;
        slot.first_block = None;
        slot.free_next = inner.free_message_head;
        inner.free_message_head = Some(id.index);
        Ok(())
    }

    pub(crate) fn queue_next(&self, id: MessageId) -> Result<Option<MessageId>> {
        let inner = self.inner.borrow();
        let slot = inner.slot(id)?;
        Ok(slot.queue_next.map(|idx| MessageId {
            index: idx,
            generation: inner.messages[idx as usize].generation,
        }))
    }

    pub(crate) fn set_queue_next(&self, id: MessageId, next: Option<MessageId>) -> Result<()> {
        self.inner.borrow_mut().slot_mut(id)?.queue_next = next.map(|m| m.index);
        Ok(())
    }

    pub(crate) fn set_on_queue(&self, id: MessageId, on_queue: bool) -> Result<()> {
        self.inner.borrow_mut().slot_mut(id)?.on_queue = on_queue;
        Ok(())
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new()
    }
}

fn blocks_needed(length: u32, headroom: u16) -> usize {
    let total = headroom as u64 + length as u64;
    (total.div_ceil(BLOCK_SIZE as u64)).max(1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_starts_empty() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        assert_eq!(pool.length(id).unwrap(), 0);
        assert_eq!(pool.offset(id).unwrap(), 0);
    }

    #[test]
    fn append_and_read_round_trip() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        pool.append(id, b"hello world").unwrap();
        assert_eq!(pool.length(id).unwrap(), 11);
        let mut buf = [0u8; 11];
        let n = pool.read(id, 0, &mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn append_spanning_multiple_blocks() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Raw).unwrap();
        let data: heapless::Vec<u8, 300> = (0..300u32).map(|i| (i % 251) as u8).collect();
        pool.append(id, &data).unwrap();
        assert_eq!(pool.length(id).unwrap(), 300);
        let mut buf = [0u8; 300];
        assert_eq!(pool.read(id, 0, &mut buf).unwrap(), 300);
        assert_eq!(&buf[..], data.as_slice());
    }

    #[test]
    fn read_past_length_returns_short_count() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        pool.append(id, b"abc").unwrap();
        let mut buf = [0u8; 10];
        let n = pool.read(id, 1, &mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"bc");
    }

    #[test]
    fn prepend_uses_reserved_headroom_without_copy() {
        let pool = MessagePool::new();
        let id = pool.new_message(8, MessageType::MacData).unwrap();
        pool.append(id, b"payload").unwrap();
        pool.prepend(id, b"HDR").unwrap();
        let mut buf = [0u8; 10];
        pool.read(id, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"HDRpayload");
    }

    #[test]
    fn prepend_beyond_reserved_headroom_fails() {
        let pool = MessagePool::new();
        let id = pool.new_message(2, MessageType::MacData).unwrap();
        assert_eq!(pool.prepend(id, b"too long"), Err(ThreadError::NoBufs));
    }

    #[test]
    fn set_offset_rejects_past_length() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        pool.append(id, b"abc").unwrap();
        assert!(pool.set_offset(id, 3).is_ok());
        assert_eq!(pool.set_offset(id, 4), Err(ThreadError::InvalidArgs));
    }

    #[test]
    fn set_length_shrink_then_grow_frees_and_reallocates_blocks() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Raw).unwrap();
        pool.set_length(id, 300).unwrap();
        let used_after_grow = NUM_BLOCKS - pool.free_blocks();
        assert!(used_after_grow >= 3);
        pool.set_length(id, 10).unwrap();
        assert_eq!(pool.length(id).unwrap(), 10);
        assert!(NUM_BLOCKS - pool.free_blocks() < used_after_grow);
    }

    #[test]
    fn free_returns_blocks_to_pool() {
        let pool = MessagePool::new();
        let before = pool.free_blocks();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        pool.append(id, &[0u8; 300]).unwrap();
        assert!(pool.free_blocks() < before);
        pool.free(id).unwrap();
        assert_eq!(pool.free_blocks(), before);
    }

    #[test]
    fn free_while_on_queue_is_rejected() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        pool.set_on_queue(id, true).unwrap();
        assert_eq!(pool.free(id), Err(ThreadError::InvalidState));
    }

    #[test]
    fn stale_handle_after_free_is_rejected() {
        let pool = MessagePool::new();
        let id = pool.new_message(0, MessageType::Ip6).unwrap();
        pool.free(id).unwrap();
        assert_eq!(pool.length(id), Err(ThreadError::InvalidArgs));
    }

    #[test]
    fn pool_exhaustion_returns_nobufs() {
        let pool = MessagePool::new();
        let mut ids = heapless::Vec::<MessageId, NUM_BLOCKS>::new();
        let mut exhausted = false;
        for _ in 0..NUM_BLOCKS + 1 {
            match pool.new_message(0, MessageType::Raw) {
                Ok(id) => ids.push(id).ok(),
                Err(ThreadError::NoBufs) => {
                    exhausted = true;
                    None
                }
                Err(e) => panic!("unexpected error {e:?}"),
            };
        }
        assert!(exhausted);
    }
}
