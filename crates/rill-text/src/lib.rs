#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![doc = "rill-text: 字节通道之上的增量 UTF-8 文本与行读取。"]
#![doc = ""]
#![doc = "文本按任意字节边界分批到达，多字节字符可能被切在交付单元中间。"]
#![doc = "[`StringReader`] 维护一段与通道本地字节一一对应的已解码缓存，"]
#![doc = "行级与块级读取都在缓存上进行，消费多少字符就从通道丢弃多少字节。"]

extern crate alloc;

mod reader;

pub use reader::StringReader;
