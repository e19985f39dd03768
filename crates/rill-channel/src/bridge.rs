//! 单槽交接桥：读写两端在此会合，完成 Packet 的所有权转移。
//!
//! # 模块角色（Why）
//! - 通道的背压模型是“交接即挂起”：生产方 flush 后必须等消费方取走
//!   本批字节才能继续，天然把水位压到一个在途 Packet；
//! - 桥内状态被建模为显式三态（空闲 / 单侧等待 / 已关闭），所有转移
//!   都在一把锁内完成，未覆盖的组合一律判定为实现缺陷并以
//!   [`codes::CHANNEL_STATE_CORRUPTED`] 报告，而不是静默挂死。
//!
//! # 核心不变式（What）
//! - 生产方处于等待态 ⇒ 槽位必有 Packet（它在等对方取走）；
//! - 消费方处于等待态 ⇒ 槽位必空（它在等数据到达）；
//! - 关闭原因粘性：第一个记录的原因永久生效，后续操作重复抛出它；
//! - 唤醒永远发生在释放锁之后，杜绝唤醒方与被唤醒方争抢同一把锁。

use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use spin::Mutex;

use rill_core::{CoreError, Packet, codes};

/// 等待方的身份，用于区分同一 `Waiting` 态下究竟是谁停在桥上。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Producer,
    Consumer,
}

/// 桥的显式状态机。
#[derive(Debug)]
enum HandoffState {
    /// 无人等待。
    Idle,
    /// 恰有一侧挂起，`waker` 是它的恢复句柄。
    Waiting { side: Side, waker: Waker },
    /// 已终止：`cause` 为空表示干净关闭，非空表示带原因取消。
    Closed { cause: Option<Arc<CoreError>> },
}

/// 状态与槽位必须在同一临界区内观察，故合并为一个受锁单元。
#[derive(Debug)]
struct Cell {
    state: HandoffState,
    slot: Option<Packet>,
}

/// 读写两端共享的交接桥。
#[derive(Debug)]
pub(crate) struct Handoff {
    cell: Mutex<Cell>,
}

fn corrupted(detail: &'static str) -> CoreError {
    tracing::error!(detail, "handoff state machine reached an uncovered transition");
    CoreError::new(codes::CHANNEL_STATE_CORRUPTED, detail)
}

impl Handoff {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(Cell {
                state: HandoffState::Idle,
                slot: None,
            }),
        }
    }

    /// 预置一份已干净关闭、槽位装载 `packet` 的桥（用于内存数据源）。
    pub(crate) fn preloaded(packet: Option<Packet>) -> Self {
        Self {
            cell: Mutex::new(Cell {
                state: HandoffState::Closed { cause: None },
                slot: packet.filter(|p| !p.is_empty()),
            }),
        }
    }

    /// 把 `packet` 交给消费方，直到对方取走才完成。
    pub(crate) fn flush(&self, packet: Packet) -> Flush<'_> {
        Flush {
            handoff: self,
            packet: Some(packet),
            parked: false,
        }
    }

    /// 等待下一批字节；`Ok(None)` 表示流已干净终止。
    pub(crate) fn consume(&self) -> Consume<'_> {
        Consume {
            handoff: self,
            parked: false,
        }
    }

    /// 干净关闭：槽内未取走的 Packet 保留给消费方排空。幂等。
    pub(crate) fn close(&self) {
        let waker = {
            let mut cell = self.cell.lock();
            if matches!(cell.state, HandoffState::Closed { .. }) {
                return;
            }
            let previous = core::mem::replace(
                &mut cell.state,
                HandoffState::Closed { cause: None },
            );
            match previous {
                HandoffState::Waiting { waker, .. } => Some(waker),
                _ => None,
            }
        };
        tracing::debug!("byte channel closed cleanly");
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// 带原因取消：槽内数据作废，第一个原因粘性生效。幂等。
    pub(crate) fn cancel(&self, cause: CoreError) {
        let waker = {
            let mut cell = self.cell.lock();
            if matches!(cell.state, HandoffState::Closed { .. }) {
                // 第一个终止结论（无论干净与否）粘性生效。
                return;
            }
            cell.slot = None;
            let previous = core::mem::replace(
                &mut cell.state,
                HandoffState::Closed {
                    cause: Some(Arc::new(cause)),
                },
            );
            match previous {
                HandoffState::Waiting { waker, .. } => Some(waker),
                _ => None,
            }
        };
        tracing::debug!("byte channel cancelled");
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// 终止原因（若为带原因取消）。
    pub(crate) fn closed_cause(&self) -> Option<Arc<CoreError>> {
        match &self.cell.lock().state {
            HandoffState::Closed { cause } => cause.clone(),
            _ => None,
        }
    }

    /// 是否已进入终止态（无论干净与否）。
    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.cell.lock().state, HandoffState::Closed { .. })
    }

    /// 终止且槽位已排空：消费方不会再看到任何字节。
    pub(crate) fn is_drained(&self) -> bool {
        let cell = self.cell.lock();
        matches!(cell.state, HandoffState::Closed { .. }) && cell.slot.is_none()
    }
}

/// 生产侧交接 Future。
///
/// # 逻辑解析（How）
/// - 首轮：终止态立即按原因裁决；消费方在等则装槽并互换等待方；
///   空闲则装槽后自挂起；
/// - 后续轮：槽空即对方已取走，完成；槽仍满且桥被终止则按原因裁决；
///   否则刷新唤醒句柄继续等待。
pub(crate) struct Flush<'a> {
    handoff: &'a Handoff,
    packet: Option<Packet>,
    parked: bool,
}

impl Future for Flush<'_> {
    type Output = rill_core::Result<(), CoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut wake_peer = None;
        let result = {
            let mut cell = this.handoff.cell.lock();
            if !this.parked {
                match &mut cell.state {
                    HandoffState::Closed { cause: Some(cause) } => {
                        Poll::Ready(Err((**cause).clone()))
                    }
                    HandoffState::Closed { cause: None } => {
                        // 干净关闭后的 flush 无处可去，按丢弃处理。
                        this.packet = None;
                        Poll::Ready(Ok(()))
                    }
                    HandoffState::Idle => {
                        cell.slot = this.packet.take();
                        cell.state = HandoffState::Waiting {
                            side: Side::Producer,
                            waker: cx.waker().clone(),
                        };
                        this.parked = true;
                        Poll::Pending
                    }
                    HandoffState::Waiting {
                        side: Side::Consumer,
                        waker,
                    } => {
                        wake_peer = Some(waker.clone());
                        cell.slot = this.packet.take();
                        cell.state = HandoffState::Waiting {
                            side: Side::Producer,
                            waker: cx.waker().clone(),
                        };
                        this.parked = true;
                        Poll::Pending
                    }
                    HandoffState::Waiting {
                        side: Side::Producer,
                        ..
                    } => Poll::Ready(Err(CoreError::new(
                        codes::CHANNEL_BUSY,
                        "another flush is already in flight on this channel",
                    ))),
                }
            } else {
                let slot_is_empty = cell.slot.is_none();
                match &mut cell.state {
                    // 取消优先于“是否已交付”的判断：取消让交付失去意义。
                    HandoffState::Closed { cause: Some(cause) } => {
                        let err = (**cause).clone();
                        cell.slot = None;
                        Poll::Ready(Err(err))
                    }
                    // 干净关闭：槽内残留留给消费方排空，交接视为完成。
                    HandoffState::Closed { cause: None } => Poll::Ready(Ok(())),
                    _ if slot_is_empty => Poll::Ready(Ok(())),
                    HandoffState::Waiting {
                        side: Side::Producer,
                        waker,
                    } => {
                        if !waker.will_wake(cx.waker()) {
                            *waker = cx.waker().clone();
                        }
                        Poll::Pending
                    }
                    _ => Poll::Ready(Err(corrupted(
                        "producer parked but handoff is not in producer-waiting state",
                    ))),
                }
            }
        };
        if let Some(waker) = wake_peer {
            waker.wake();
        }
        result
    }
}

/// 等待中被丢弃（调用方超时或放弃）即为中断：桥必须回到空闲，
/// 未交接出去的数据作废，后续操作照常进行。
impl Drop for Flush<'_> {
    fn drop(&mut self) {
        if !self.parked {
            return;
        }
        let mut cell = self.handoff.cell.lock();
        if matches!(
            cell.state,
            HandoffState::Waiting {
                side: Side::Producer,
                ..
            }
        ) {
            // 单写者纪律保证等待记录属于本次交接。
            cell.slot = None;
            cell.state = HandoffState::Idle;
        }
    }
}

/// 消费侧交接 Future。
pub(crate) struct Consume<'a> {
    handoff: &'a Handoff,
    parked: bool,
}

impl Future for Consume<'_> {
    type Output = rill_core::Result<Option<Packet>, CoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut wake_peer = None;
        let result = {
            let mut cell = this.handoff.cell.lock();
            if let Some(packet) = cell.slot.take() {
                // 取走数据的同时放行可能在等待的生产方。
                if let HandoffState::Waiting {
                    side: Side::Producer,
                    ..
                } = &cell.state
                {
                    let previous =
                        core::mem::replace(&mut cell.state, HandoffState::Idle);
                    if let HandoffState::Waiting { waker, .. } = previous {
                        wake_peer = Some(waker);
                    }
                }
                Poll::Ready(Ok(Some(packet)))
            } else {
                match &mut cell.state {
                    HandoffState::Closed { cause: Some(cause) } => {
                        Poll::Ready(Err((**cause).clone()))
                    }
                    HandoffState::Closed { cause: None } => Poll::Ready(Ok(None)),
                    HandoffState::Idle => {
                        cell.state = HandoffState::Waiting {
                            side: Side::Consumer,
                            waker: cx.waker().clone(),
                        };
                        this.parked = true;
                        Poll::Pending
                    }
                    HandoffState::Waiting {
                        side: Side::Consumer,
                        waker,
                    } => {
                        if this.parked {
                            if !waker.will_wake(cx.waker()) {
                                *waker = cx.waker().clone();
                            }
                            Poll::Pending
                        } else {
                            Poll::Ready(Err(CoreError::new(
                                codes::CHANNEL_BUSY,
                                "another read is already waiting on this channel",
                            )))
                        }
                    }
                    HandoffState::Waiting {
                        side: Side::Producer,
                        ..
                    } => Poll::Ready(Err(corrupted(
                        "producer is waiting but the slot is empty",
                    ))),
                }
            }
        };
        if let Some(waker) = wake_peer {
            waker.wake();
        }
        result
    }
}

impl Drop for Consume<'_> {
    fn drop(&mut self) {
        if !self.parked {
            return;
        }
        let mut cell = self.handoff.cell.lock();
        if matches!(
            cell.state,
            HandoffState::Waiting {
                side: Side::Consumer,
                ..
            }
        ) {
            cell.state = HandoffState::Idle;
        }
    }
}
