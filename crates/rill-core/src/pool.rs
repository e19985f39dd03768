//! 借出 / 归还纪律的对象池：通用容量池与一次性单实例池。
//!
//! # 模块角色（Why）
//! - 高频短命对象（缓冲、编解码上下文）按次分配代价可观，池化把分配摊到
//!   首次借出，之后的借出只是自由链表弹栈；
//! - 单实例池服务“同一时刻最多一个在途实例”的场景：借出即独占，归还即
//!   销毁，第二次借出在归还前必然失败，用于守护一次性握手资源。
//!
//! # 契约速记（What）
//! - 所有违规（重复借出、归还陌生实例、向已释放的池操作）都以
//!   [`codes`](crate::error::codes) 下的 `pool.*` 错误码同步报告，绝不 panic；
//! - [`ObjectPool::dispose`] 幂等：首次调用释放全部闲置实例，之后的归还
//!   直接销毁实例而不是放回。

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spin::Mutex;

use crate::error::{CoreError, codes};

/// 池化实例的来源：负责生产新实例与销毁退役实例。
///
/// # 契约说明（What）
/// - `produce` 在池空时被调用，允许失败（例如底层资源耗尽）；
/// - `dispose` 负责实例的终局清理，池保证每个实例恰好被销毁一次
///   （或者仍存活在自由链表中直到池本身释放）。
pub trait PoolSource {
    /// 池管理的实例类型。
    type Instance;

    /// 生产一个全新实例。
    fn produce(&self) -> crate::Result<Self::Instance, CoreError>;

    /// 销毁一个不再回池的实例。
    fn dispose(&self, instance: Self::Instance);
}

/// `ObjectPool` 是带容量上限的通用自由链表池。
///
/// # 逻辑解析（How）
/// - 借出：优先弹出自由链表；链表为空则调用 [`PoolSource::produce`]；
/// - 归还：自由链表未达容量上限则放回，否则直接销毁，防止峰值之后
///   内存滞留；
/// - `outstanding` 原子计数既用于识别“归还多于借出”的违规，也让
///   [`stats`](ObjectPool::stats) 能报告在途实例数。
///
/// # 设计取舍（Trade-offs）
/// - 使用 `spin::Mutex` 保护自由链表，与本工作区其它共享结构保持一致，
///   临界区只有一次 `Vec` 弹入 / 弹出，自旋代价可控；
/// - 容量上限约束的是**闲置**实例数而非在途实例数：突发借出永不失败
///   （只要 `produce` 成功），回落后多余实例被销毁。
pub struct ObjectPool<S: PoolSource> {
    source: S,
    capacity: usize,
    free: Mutex<Vec<S::Instance>>,
    outstanding: AtomicUsize,
    disposed: AtomicBool,
}

/// 池的实时快照，供日志与测试断言使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// 自由链表中的闲置实例数。
    pub idle: usize,
    /// 已借出未归还的实例数。
    pub outstanding: usize,
    /// 闲置实例数上限。
    pub capacity: usize,
}

impl<S: PoolSource> ObjectPool<S> {
    /// 创建闲置上限为 `capacity` 的池。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：`capacity >= 1`，否则池退化为纯分配器；
    /// - **后置条件**：池为空，首次借出必经 `produce`。
    pub fn new(source: S, capacity: usize) -> Self {
        Self {
            source,
            capacity,
            free: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    /// 闲置实例数上限。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前快照。
    pub fn stats(&self) -> PoolSnapshot {
        PoolSnapshot {
            idle: self.free.lock().len(),
            outstanding: self.outstanding.load(Ordering::Relaxed),
            capacity: self.capacity,
        }
    }

    /// 借出一个实例。
    ///
    /// # 契约说明（What）
    /// - **后置条件**：成功时实例的所有权完全转移给调用方，直到
    ///   [`recycle`](ObjectPool::recycle) 归还；
    /// - **错误**：池已释放返回 [`codes::POOL_DISPOSED`]；`produce` 的
    ///   失败原样透传。
    pub fn borrow(&self) -> crate::Result<S::Instance, CoreError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::new(
                codes::POOL_DISPOSED,
                "pool already disposed, no more instances can be borrowed",
            ));
        }
        let reused = self.free.lock().pop();
        let instance = match reused {
            Some(instance) => instance,
            None => self.source.produce()?,
        };
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        Ok(instance)
    }

    /// 归还一个此前借出的实例。
    ///
    /// # 契约说明（What）
    /// - **错误**：在途实例计数为零时归还，说明调用方从未借出或重复归还，
    ///   返回 [`codes::POOL_FOREIGN_INSTANCE`]，实例被就地销毁；
    /// - 池已释放时实例直接销毁，归还本身仍视为成功。
    pub fn recycle(&self, instance: S::Instance) -> crate::Result<(), CoreError> {
        if self.disposed.load(Ordering::Acquire) {
            self.source.dispose(instance);
            return Ok(());
        }

        let claimed = self
            .outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
                prev.checked_sub(1)
            });
        if claimed.is_err() {
            self.source.dispose(instance);
            return Err(CoreError::new(
                codes::POOL_FOREIGN_INSTANCE,
                "recycle without a matching borrow",
            ));
        }

        let overflow = {
            let mut free = self.free.lock();
            if free.len() < self.capacity {
                free.push(instance);
                None
            } else {
                Some(instance)
            }
        };
        if let Some(instance) = overflow {
            self.source.dispose(instance);
        }
        Ok(())
    }

    /// 借出实例执行闭包，结束后自动归还。
    ///
    /// 归还失败的错误优先级低于闭包自身的错误。
    pub fn with_instance<T>(
        &self,
        body: impl FnOnce(&mut S::Instance) -> crate::Result<T, CoreError>,
    ) -> crate::Result<T, CoreError> {
        let mut instance = self.borrow()?;
        let result = body(&mut instance);
        let recycled = self.recycle(instance);
        match result {
            Ok(value) => {
                recycled?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// 释放池：销毁所有闲置实例，此后借出一律失败。幂等。
    ///
    /// 在途实例不受影响，它们在归还时被就地销毁。
    pub fn dispose(&self) {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let drained: Vec<S::Instance> = core::mem::take(&mut *self.free.lock());
        for instance in drained {
            self.source.dispose(instance);
        }
    }
}

impl<S: PoolSource> Drop for ObjectPool<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// `SingleInstancePool` 在整个生命周期内只发放一个实例，且只发放一次。
///
/// # 设计背景（Why）
/// - 某些资源（如一次性握手缓冲）天然只允许一个在途持有者，归还即终结；
///   把纪律下沉到池里，调用方的重复借出 / 错误归还都会变成显式错误而非
///   静默的资源混用。
///
/// # 契约说明（What）
/// - 第二次借出（归还前）返回 [`codes::POOL_EXHAUSTED`]；
/// - 归还时按地址校验身份，陌生实例返回 [`codes::POOL_FOREIGN_INSTANCE`]
///   且被就地销毁，池状态不变；
/// - 成功归还即销毁实例并终结池，此后任何借出 / 归还都是
///   [`codes::POOL_DISPOSED`]。
pub struct SingleInstancePool<T, S: PoolSource<Instance = Box<T>>> {
    source: S,
    borrowed: AtomicBool,
    disposed: AtomicBool,
    // 在途实例的地址指纹，归还时校验身份。
    live: Mutex<Option<usize>>,
}

impl<T, S: PoolSource<Instance = Box<T>>> SingleInstancePool<T, S> {
    /// 创建未借出状态的单实例池。
    pub fn new(source: S) -> Self {
        Self {
            source,
            borrowed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            live: Mutex::new(None),
        }
    }

    /// 恒为 1。
    pub fn capacity(&self) -> usize {
        1
    }

    /// 借出唯一实例。
    pub fn borrow(&self) -> crate::Result<Box<T>, CoreError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::new(
                codes::POOL_DISPOSED,
                "single-instance pool already disposed",
            ));
        }
        if self
            .borrowed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::new(
                codes::POOL_EXHAUSTED,
                "the single instance is already borrowed",
            ));
        }
        let instance = match self.source.produce() {
            Ok(instance) => instance,
            Err(err) => {
                self.borrowed.store(false, Ordering::Release);
                return Err(err);
            }
        };
        *self.live.lock() = Some(core::ptr::from_ref::<T>(&*instance) as usize);
        Ok(instance)
    }

    /// 归还并销毁唯一实例，终结池。
    pub fn recycle(&self, instance: Box<T>) -> crate::Result<(), CoreError> {
        if self.disposed.load(Ordering::Acquire) {
            self.source.dispose(instance);
            return Err(CoreError::new(
                codes::POOL_DISPOSED,
                "single-instance pool already disposed",
            ));
        }

        let identity = core::ptr::from_ref::<T>(&*instance) as usize;
        let matches = {
            let mut live = self.live.lock();
            if *live == Some(identity) {
                *live = None;
                true
            } else {
                false
            }
        };
        if !matches {
            self.source.dispose(instance);
            return Err(CoreError::new(
                codes::POOL_FOREIGN_INSTANCE,
                "recycled instance was not borrowed from this pool",
            ));
        }

        self.source.dispose(instance);
        self.disposed.store(true, Ordering::Release);
        self.borrowed.store(false, Ordering::Release);
        Ok(())
    }

    /// 池是否已终结。
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
