//! `channel_contract` 集成测试：从公开 API 视角验证字节通道的交接契约。
//!
//! # 测试目标（Why）
//! - 保障“flush 即交付单元、交付前写端挂起”的背压模型在真实的双任务
//!   并发下成立，而不只是状态机单步推演；
//! - 覆盖终止语义的三条路径：干净关闭后的 EOF、带因取消的粘性错误、
//!   Drop 兜底取消；
//! - 组合子（拷贝 / 截断 / 分流 / 变换）作为用户最常见的装配方式，
//!   必须保证错误沿拓扑传播到每个下游。
//!
//! # 结构安排（How）
//! - 统一用 `futures::executor::block_on` + `join!` 在单线程上并发驱动
//!   读写两端，唤醒完全依赖通道自身的 `Waker` 交接；
//! - 取消原因用 `thiserror` 定义的独立错误类型充当根因，验证原因链
//!   能穿过通道完整抵达对端。

use futures::executor::block_on;
use futures::{join, pin_mut, poll};
use rill_channel::{ByteReadChannel, byte_channel};
use rill_core::{CoreError, Packet, codes};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("upstream transport failed: {reason}")]
struct TransportFailure {
    reason: &'static str,
}

/// 写端逐类型写入并关闭，读端按同样顺序读回。
#[test]
fn typed_values_cross_the_channel_in_order() {
    let (mut writer, mut reader) = byte_channel();
    let (write_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_i32(0x1234_5678)?;
                writer.write_str("rill")?;
                writer.write_f64(2.5)?;
                writer.flush_and_close().await
            },
            async {
                let header = reader.read_i32().await?;
                let name = reader.read_byte_array(4).await?;
                let ratio = reader.read_f64().await?;
                Ok::<_, CoreError>((header, name, ratio))
            }
        )
    });
    write_outcome.expect("write side should close cleanly");
    let (header, name, ratio) = read_outcome.expect("read side should see every value");
    assert_eq!(header, 0x1234_5678);
    assert_eq!(name, b"rill");
    assert_eq!(ratio, 2.5);
}

/// 每次 flush 是一个独立交付单元，通道不得合并两次交付。
#[test]
fn flush_boundaries_are_preserved() {
    let (mut writer, mut reader) = byte_channel();
    let (write_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_u8(1)?;
                writer.flush().await?;
                writer.write_u8(2)?;
                writer.flush().await?;
                writer.close()
            },
            async {
                let mut units = Vec::new();
                while let Some(mut packet) = reader.next_packet().await? {
                    units.push(packet.to_byte_array());
                }
                Ok::<_, CoreError>(units)
            }
        )
    });
    write_outcome.expect("two flushes then close");
    let units = read_outcome.expect("reader drains both units");
    assert_eq!(units, vec![vec![1u8], vec![2u8]]);
}

/// 写端在读端消费前保持挂起：单元接力证明交付的同步性。
#[test]
fn flush_suspends_until_consumed() {
    let (mut writer, mut reader) = byte_channel();
    let (write_outcome, read_outcome) = block_on(async {
        join!(
            async {
                for round in 0u8..8 {
                    writer.write_u8(round)?;
                    // 若 flush 不等待消费，读端将观察到单元合并。
                    writer.flush().await?;
                }
                writer.close()
            },
            async {
                let mut seen = Vec::new();
                while let Some(mut packet) = reader.next_packet().await? {
                    assert_eq!(packet.available_for_read(), 1);
                    seen.push(packet.to_byte_array()[0]);
                }
                Ok::<_, CoreError>(seen)
            }
        )
    });
    write_outcome.expect("writer completes all rounds");
    assert_eq!(read_outcome.expect("reader sees each round"), (0u8..8).collect::<Vec<_>>());
}

/// 带因取消穿过通道抵达读端，且同一原因重复抛出。
#[test]
fn cancellation_cause_reaches_reader_and_sticks() {
    let (mut writer, mut reader) = byte_channel();
    writer.cancel(Some(
        CoreError::new(codes::CHANNEL_CANCELLED, "transport tore down")
            .with_cause(TransportFailure { reason: "connection reset" }),
    ));

    let first = block_on(reader.read_u8()).expect_err("cancelled channel must not yield bytes");
    assert_eq!(first.code(), codes::CHANNEL_CANCELLED);
    assert!(first.cause().expect("root cause travels with the error")
        .to_string()
        .contains("connection reset"));

    let second = block_on(reader.read_u8()).expect_err("cause is sticky");
    assert_eq!(second.code(), codes::CHANNEL_CANCELLED);
}

/// 读端取消能解除写端的 flush 挂起。
#[test]
fn reader_cancel_unblocks_pending_flush() {
    let (mut writer, mut reader) = byte_channel();
    let (write_outcome, ()) = block_on(async {
        join!(
            async {
                writer.write_slice(b"never delivered")?;
                writer.flush().await
            },
            async {
                reader.cancel(Some(CoreError::new(
                    codes::CHANNEL_CANCELLED,
                    "reader gave up",
                )));
            }
        )
    });
    let err = write_outcome.expect_err("flush must fail once the peer cancels");
    assert_eq!(err.code(), codes::CHANNEL_CANCELLED);
}

/// 写端 Drop 未关闭按取消处理，读端不会无限等待。
#[test]
fn dropping_writer_cancels_the_stream() {
    let (writer, mut reader) = byte_channel();
    drop(writer);
    let err = block_on(reader.read_u8()).expect_err("dropped writer means cancellation");
    assert_eq!(err.code(), codes::CHANNEL_CANCELLED);
}

/// 干净关闭后的定长读取在字节不足时报 END_OF_INPUT。
#[test]
fn short_stream_yields_end_of_input() {
    let (mut writer, mut reader) = byte_channel();
    let (write_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_u8(0xAB)?;
                writer.flush_and_close().await
            },
            async { reader.read_i32().await }
        )
    });
    write_outcome.expect("single byte then clean close");
    let err = read_outcome.expect_err("four bytes can never arrive");
    assert_eq!(err.code(), codes::END_OF_INPUT);
}

/// 带未 flush 字节直接 close 是使用错误。
#[test]
fn close_with_pending_bytes_is_rejected() {
    let (mut writer, _reader) = byte_channel();
    writer.write_u8(7).expect("local write");
    let err = writer.close().expect_err("pending bytes must block close");
    assert_eq!(err.code(), codes::CHANNEL_PENDING_BYTES);
    assert_eq!(writer.pending_bytes(), 1);
}

/// 等待中被放弃（调用方超时等场景）后通道保持可用，未交付的单元作废。
#[test]
fn interrupted_waits_leave_the_channel_usable() {
    let (mut writer, mut reader) = byte_channel();
    block_on(async {
        {
            // 读端在空通道上挂起一次后被放弃。
            let pending_read = reader.read_u8();
            pin_mut!(pending_read);
            assert!(poll!(&mut pending_read).is_pending());
        }
        {
            // 写端 flush 挂起后被放弃：摘走的单元不得事后送达。
            writer.write_slice(b"stale").expect("local write");
            let pending_flush = writer.flush();
            pin_mut!(pending_flush);
            assert!(poll!(&mut pending_flush).is_pending());
        }
        // flush 启动时缓冲已摘空，被放弃的字节随之作废。
        assert_eq!(writer.pending_bytes(), 0);
    });
    let (write_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_slice(b"fresh")?;
                writer.flush_and_close().await
            },
            async {
                let mut bytes = reader.read_remaining().await?;
                Ok::<_, CoreError>(bytes.to_byte_array())
            }
        )
    });
    write_outcome.expect("channel survives both interruptions");
    assert_eq!(read_outcome.expect("only live bytes arrive"), b"fresh");
}

/// 内存数据源读端：读完即干净 EOF。
#[test]
fn preloaded_reader_serves_then_terminates() {
    let mut reader = ByteReadChannel::from_packet(Packet::from_slice(b"\x00\x2Apayload"));
    let outcome = block_on(async {
        let tag = reader.read_i16().await?;
        let body = reader.read_remaining().await?;
        Ok::<_, CoreError>((tag, body))
    });
    let (tag, mut body) = outcome.expect("preloaded bytes are all readable");
    assert_eq!(tag, 0x2A);
    assert_eq!(body.to_byte_array(), b"payload");
    assert!(reader.is_closed_for_read());
}

/// copy_to 按上游交付节奏搬运并尊重上限。
#[test]
fn copy_to_honours_limit() {
    let (mut writer, mut source) = byte_channel();
    let (mut sink_writer, mut sink_reader) = byte_channel();
    let (write_outcome, copy_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_slice(b"0123456789")?;
                writer.flush_and_close().await
            },
            async {
                let copied = source.copy_to(&mut sink_writer, 6).await?;
                sink_writer.flush_and_close().await?;
                Ok::<_, CoreError>(copied)
            },
            async {
                let mut collected = sink_reader.read_remaining().await?;
                Ok::<_, CoreError>(collected.to_byte_array())
            }
        )
    });
    write_outcome.expect("source side");
    assert_eq!(copy_outcome.expect("copy driver"), 6);
    assert_eq!(read_outcome.expect("sink side"), b"012345");
    // 上游剩余字节原样保留。
    assert_eq!(source.available_for_read(), 4);
}

/// limited 之后下游最多看到 limit 字节并以干净 EOF 结束。
#[test]
fn limited_view_ends_with_clean_eof() {
    let (mut writer, source) = byte_channel();
    let (mut limited, driver) = source.limited(3);
    let (write_outcome, driver_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_slice(b"abcdef")?;
                writer.flush_and_close().await
            },
            driver,
            async {
                let mut visible = limited.read_remaining().await?;
                Ok::<_, CoreError>(visible.to_byte_array())
            }
        )
    });
    write_outcome.expect("upstream");
    driver_outcome.expect("limit driver");
    assert_eq!(read_outcome.expect("downstream"), b"abc");
}

/// split 把同一字节流完整复制给两个下游。
#[test]
fn split_duplicates_every_unit() {
    let (mut writer, source) = byte_channel();
    let (mut left, mut right, driver) = source.split();
    let (write_outcome, driver_outcome, left_outcome, right_outcome) = block_on(async {
        join!(
            async {
                writer.write_slice(b"twin")?;
                writer.flush().await?;
                writer.write_slice(b"-stream")?;
                writer.flush_and_close().await
            },
            driver,
            async {
                let mut bytes = left.read_remaining().await?;
                Ok::<_, CoreError>(bytes.to_byte_array())
            },
            async {
                let mut bytes = right.read_remaining().await?;
                Ok::<_, CoreError>(bytes.to_byte_array())
            }
        )
    });
    write_outcome.expect("upstream");
    driver_outcome.expect("split driver");
    assert_eq!(left_outcome.expect("left branch"), b"twin-stream");
    assert_eq!(right_outcome.expect("right branch"), b"twin-stream");
}

/// map_read 对每个交付单元执行变换，错误取消所有下游。
#[test]
fn map_read_transforms_units() {
    let (mut writer, source) = byte_channel();
    let (mut mapped, driver) = source.map_read(|mut packet| {
        let mut upper = Packet::new();
        for byte in packet.to_byte_array() {
            upper.write_u8(byte.to_ascii_uppercase())?;
        }
        Ok(upper)
    });
    let (write_outcome, driver_outcome, read_outcome) = block_on(async {
        join!(
            async {
                writer.write_slice(b"quiet")?;
                writer.flush_and_close().await
            },
            driver,
            async {
                let mut bytes = mapped.read_remaining().await?;
                Ok::<_, CoreError>(bytes.to_byte_array())
            }
        )
    });
    write_outcome.expect("upstream");
    driver_outcome.expect("map driver");
    assert_eq!(read_outcome.expect("mapped bytes"), b"QUIET");
}

/// map_write 在交付前改写字节，下游读端看到的是变换结果。
#[test]
fn map_write_rewrites_before_delivery() {
    let (inner_writer, mut inner_reader) = byte_channel();
    let (mut outer_writer, driver) = inner_writer.map_write(|mut packet| {
        let mut masked = Packet::new();
        for byte in packet.to_byte_array() {
            masked.write_u8(byte ^ 0xFF)?;
        }
        Ok(masked)
    });
    let (write_outcome, driver_outcome, read_outcome) = block_on(async {
        join!(
            async {
                outer_writer.write_slice(&[0x00, 0x0F])?;
                outer_writer.flush_and_close().await
            },
            driver,
            async {
                let mut bytes = inner_reader.read_remaining().await?;
                Ok::<_, CoreError>(bytes.to_byte_array())
            }
        )
    });
    write_outcome.expect("outer writer");
    driver_outcome.expect("map_write driver");
    assert_eq!(read_outcome.expect("masked bytes"), vec![0xFF, 0xF0]);
}
