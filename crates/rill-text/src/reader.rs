//! 通道文本读取器：解码缓存与消费回写。
//!
//! # 模块角色（Why）
//! - 行协议（HTTP 头、SIP 起始行、REPL 输入）需要在字节流上做字符级
//!   扫描，而扫描点前后的字节仍要保持精确的流位置——读掉一行之后，
//!   二进制负载必须从行终止符的下一个字节开始；
//! - 为此缓存的解码结果与通道本地字节严格一一对应：缓存是本地可读
//!   字节最长合法 UTF-8 前缀的解码，消费 n 个缓存字节等价于从通道
//!   丢弃 n 个原始字节（UTF-8 下两者逐字节相等）。

use alloc::string::String;

use rill_channel::ByteReadChannel;
use rill_core::{CoreError, codes};

/// 字节通道之上的增量文本读取器。
///
/// # 契约说明（What）
/// - 所有读取都只消费被扫描确认的字节，未消费部分留在通道里，可随时
///   切回二进制读取（通过 [`into_inner`](StringReader::into_inner)）；
/// - 输入不是合法 UTF-8、或流在多字节字符中间终止，报
///   [`codes::TEXT_MALFORMED`]；
/// - 行长超出预算报 [`codes::TEXT_LINE_TOO_LONG`] 并取消底层通道：
///   预算被击穿意味着流位置已不可信，继续读取只会产出错位数据。
pub struct StringReader {
    input: ByteReadChannel,
    /// 本地可读字节最长合法前缀的解码结果。
    cache: String,
    /// `cache` 中已消费部分的字节长度（恒为字符边界）。
    cache_start: usize,
}

impl StringReader {
    /// 包装一条读端通道。
    pub fn new(input: ByteReadChannel) -> Self {
        Self {
            input,
            cache: String::new(),
            cache_start: 0,
        }
    }

    /// 取回底层通道；未消费的字节原样保留。
    pub fn into_inner(self) -> ByteReadChannel {
        self.input
    }

    fn malformed(detail: &'static str) -> CoreError {
        CoreError::new(codes::TEXT_MALFORMED, detail)
    }

    /// 让缓存中出现至少一个未消费字符；`Ok(false)` 表示流已干净终止。
    ///
    /// # 逻辑解析（How）
    /// - 缓存耗尽后基于通道本地字节重建：取最长合法 UTF-8 前缀；
    /// - 本地字节全部属于一个未完成的多字节字符时等待下一批交付；
    ///   等到 EOF 仍未完成即为被截断的字符，报错。
    async fn prepare_cache(&mut self) -> rill_core::Result<bool, CoreError> {
        if self.cache_start < self.cache.len() {
            return Ok(true);
        }
        self.cache.clear();
        self.cache_start = 0;

        loop {
            let have = self.input.available_for_read();
            if have > 0 {
                let bytes = self.input.readable_packet().clone().to_byte_array();
                match core::str::from_utf8(&bytes) {
                    Ok(text) => {
                        self.cache.push_str(text);
                        return Ok(true);
                    }
                    // 合法前缀先行产出，违例字节等扫描推进到它时再裁决，
                    // 避免吞掉尚可正常消费的文本。
                    Err(err) if err.valid_up_to() > 0 => {
                        let prefix = core::str::from_utf8(&bytes[..err.valid_up_to()])
                            .expect("prefix validated above");
                        self.cache.push_str(prefix);
                        return Ok(true);
                    }
                    Err(err) if err.error_len().is_some() => {
                        return Err(Self::malformed("input is not valid UTF-8"));
                    }
                    // 开头就是未完成的多字节字符，等待后续字节。
                    Err(_) => {}
                }
            }
            let grew = self
                .input
                .await_bytes_while(|packet| packet.available_for_read() <= have)
                .await?;
            if !grew {
                return if have == 0 {
                    Ok(false)
                } else {
                    Err(Self::malformed(
                        "stream terminated inside a multi-byte UTF-8 character",
                    ))
                };
            }
        }
    }

    /// 暴露一段已解码文本给 `scan`，按其返回值消费。
    ///
    /// # 契约说明（What）
    /// - `scan` 收到当前未消费的解码文本，返回要消费的**字节**数，
    ///   必须落在字符边界上且不超过可见长度，违者报
    ///   [`codes::BUFFER_OUT_OF_BOUNDS`]；
    /// - 返回 `Ok(false)` 表示流已终止且无字符可供扫描；
    /// - **后置条件**：被消费的字节已从底层通道移除。
    pub async fn read_string_chunk(
        &mut self,
        scan: impl FnOnce(&str) -> usize,
    ) -> rill_core::Result<bool, CoreError> {
        if !self.prepare_cache().await? {
            return Ok(false);
        }
        let visible = &self.cache[self.cache_start..];
        let consumed = scan(visible);
        if consumed > visible.len() || !visible.is_char_boundary(consumed) {
            return Err(CoreError::new(
                codes::BUFFER_OUT_OF_BOUNDS,
                alloc::format!(
                    "scan consumed {consumed} bytes out of {} visible",
                    visible.len()
                ),
            ));
        }
        // 缓存即本地字节的解码，消费量按字节一一对应回写到通道。
        self.input.discard(consumed as u64).await?;
        self.cache_start += consumed;
        Ok(true)
    }

    /// 读取一行并追加到 `out`，行终止符（`\n` 或 `\r\n`）被消费但不进入结果。
    ///
    /// # 契约说明（What）
    /// - `limit` 是行内容的字节预算（不含终止符）；击穿预算报
    ///   [`codes::TEXT_LINE_TOO_LONG`] 并取消底层通道；
    /// - 孤立的 `\r`（后随字符不是 `\n`）属于行内容；
    /// - 流终止前的最后一段无终止符文本视为最后一行；
    /// - 返回 `Ok(false)` 当且仅当流已终止且本次没有产出任何内容。
    pub async fn read_line_to(
        &mut self,
        out: &mut String,
        limit: usize,
    ) -> rill_core::Result<bool, CoreError> {
        let start_len = out.len();
        let mut pending_caret = false;
        let mut found_terminator = false;
        let mut over_budget = false;

        loop {
            let has_text = self
                .read_string_chunk(|visible| {
                    let mut consumed = 0usize;
                    for ch in visible.chars() {
                        let width = ch.len_utf8();
                        if pending_caret {
                            pending_caret = false;
                            if ch == '\n' {
                                consumed += width;
                                found_terminator = true;
                                break;
                            }
                            // 压住的 \r 不是终止符前缀，回归行内容。
                            if out.len() - start_len + 1 > limit {
                                over_budget = true;
                                break;
                            }
                            out.push('\r');
                        }
                        if ch == '\n' {
                            consumed += width;
                            found_terminator = true;
                            break;
                        }
                        if ch == '\r' {
                            // 可能是 \r\n 的前半，压住等下一个字符。
                            consumed += width;
                            pending_caret = true;
                            continue;
                        }
                        if out.len() - start_len + width > limit {
                            over_budget = true;
                            break;
                        }
                        out.push(ch);
                        consumed += width;
                    }
                    consumed
                })
                .await?;

            if over_budget {
                let err = CoreError::new(
                    codes::TEXT_LINE_TOO_LONG,
                    alloc::format!("line exceeds the {limit}-byte budget"),
                );
                self.input.cancel(Some(err.clone()));
                return Err(err);
            }
            if found_terminator {
                return Ok(true);
            }
            if !has_text {
                if pending_caret {
                    out.push('\r');
                }
                return Ok(out.len() > start_len);
            }
        }
    }

    /// 读取一行；`None` 表示流已终止且没有更多行。
    pub async fn read_line(
        &mut self,
        limit: usize,
    ) -> rill_core::Result<Option<String>, CoreError> {
        let mut line = String::new();
        if self.read_line_to(&mut line, limit).await? {
            Ok(Some(line))
        } else {
            Ok(None)
        }
    }

    /// 读取直到流终止的全部剩余文本。
    pub async fn read_text(&mut self) -> rill_core::Result<String, CoreError> {
        let mut collected = String::new();
        loop {
            let has_text = self
                .read_string_chunk(|visible| {
                    collected.push_str(visible);
                    visible.len()
                })
                .await?;
            if !has_text {
                return Ok(collected);
            }
        }
    }
}
