//! `index_of` 搜索性质验证。
//!
//! # 测试目标（Why）
//! - 跨块搜索携带“部分匹配偏移”状态，边界推进逻辑容易在块切分方式上
//!   出错（假接续、漏回退），靠手写用例难以穷尽；
//! - 以“把同样的字节塞进单块后做朴素子串搜索”为参照实现，随机化块
//!   切分方式，断言两者结论一致。
//!
//! # 结构安排（How）
//! - `chunked_packet`：按随机切点把同一字节串拆成多个 Chunk 链入 Packet；
//! - `naive_find`：O(n·m) 的参照搜索；
//! - 性质一：任意切分下 `index_of` 与参照一致；
//! - 性质二：discard 掉命中偏移后，needle 恰好位于读取起点。

use proptest::prelude::*;
use rill_core::{Chunk, Packet};

/// 朴素参照实现：单块视角的首次出现偏移。
fn naive_find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| &haystack[start..start + needle.len()] == needle)
}

/// 按切点序列把字节串拆块组装。
fn chunked_packet(bytes: &[u8], cuts: &[usize]) -> Packet {
    let mut packet = Packet::new();
    let mut rest = bytes;
    for cut in cuts {
        let take = cut % (rest.len() + 1);
        let (head, tail) = rest.split_at(take);
        if !head.is_empty() {
            packet.append_chunk(Chunk::from_slice(head));
        }
        rest = tail;
    }
    if !rest.is_empty() {
        packet.append_chunk(Chunk::from_slice(rest));
    }
    packet
}

proptest! {
    #[test]
    fn index_of_matches_naive_reference(
        haystack in proptest::collection::vec(0u8..4, 0..128),
        needle in proptest::collection::vec(0u8..4, 1..5),
        cuts in proptest::collection::vec(0usize..64, 0..8),
    ) {
        let packet = chunked_packet(&haystack, &cuts);
        prop_assert_eq!(packet.index_of(&needle), naive_find(&haystack, &needle));
    }

    #[test]
    fn hit_offset_is_exact(
        prefix in proptest::collection::vec(0u8..2, 0..64),
        cuts in proptest::collection::vec(0usize..32, 0..6),
    ) {
        // 字母表 {0,1}，needle 取字母表之外的值保证唯一命中。
        let needle = [7u8, 8];
        let mut haystack = prefix.clone();
        haystack.extend_from_slice(&needle);
        let mut packet = chunked_packet(&haystack, &cuts);

        let hit = packet.index_of(&needle).expect("needle was appended");
        prop_assert_eq!(hit, prefix.len());
        packet.discard_exact(hit).expect("hit is within bounds");
        prop_assert_eq!(packet.read_byte_array(2).expect("needle bytes"), needle.to_vec());
    }
}
