//! `pool_contract` 集成测试：从公开 API 视角验证对象池的借出 / 归还纪律。
//!
//! # 测试目标（Why）
//! - 池的价值在纪律而非容器：重复借出、陌生归还、释放后操作都必须变成
//!   显式错误，而不是静默的资源混用；
//! - 以外部 crate 视角调用，确保纪律完全由公开契约承载，不依赖内部
//!   字段的可见性。
//!
//! # 结构安排（How）
//! - `LeaseSource` 统计生产 / 销毁次数，充当所有场景的来源协作方；
//! - 通用池覆盖复用、溢出销毁、with_instance 自动归还与释放幂等；
//! - 单实例池覆盖一次性借出、身份校验与终结语义。

use std::sync::atomic::{AtomicUsize, Ordering};

use rill_core::pool::{ObjectPool, PoolSource, SingleInstancePool};
use rill_core::{CoreError, codes};

#[derive(Default)]
struct LeaseSource {
    produced: AtomicUsize,
    disposed: AtomicUsize,
    fail_production: bool,
}

impl PoolSource for LeaseSource {
    type Instance = Vec<u8>;

    fn produce(&self) -> Result<Vec<u8>, CoreError> {
        if self.fail_production {
            return Err(CoreError::new(codes::POOL_EXHAUSTED, "backing store is out of buffers"));
        }
        self.produced.fetch_add(1, Ordering::Relaxed);
        Ok(Vec::with_capacity(64))
    }

    fn dispose(&self, _instance: Vec<u8>) {
        self.disposed.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct BoxedSource;

impl PoolSource for BoxedSource {
    type Instance = Box<Vec<u8>>;

    fn produce(&self) -> Result<Box<Vec<u8>>, CoreError> {
        Ok(Box::new(Vec::with_capacity(8)))
    }

    fn dispose(&self, _instance: Box<Vec<u8>>) {}
}

/// 归还后的实例优先于新分配被复用。
#[test]
fn recycled_instance_is_reused_before_producing() {
    let pool = ObjectPool::new(LeaseSource::default(), 2);
    let first = pool.borrow().expect("首次借出");
    pool.recycle(first).expect("归还");
    let _second = pool.borrow().expect("复用借出");
    assert_eq!(pool.stats().outstanding, 1);
    assert_eq!(pool.stats().idle, 0);
}

/// 闲置实例超出容量上限时直接销毁，不滞留内存。
#[test]
fn idle_overflow_is_disposed() {
    let pool = ObjectPool::new(LeaseSource::default(), 1);
    let a = pool.borrow().expect("借出 a");
    let b = pool.borrow().expect("借出 b");
    pool.recycle(a).expect("归还 a");
    pool.recycle(b).expect("归还 b");
    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.outstanding, 0);
}

/// with_instance 在闭包结束后自动归还，错误原样透传。
#[test]
fn with_instance_recycles_automatically() {
    let pool = ObjectPool::new(LeaseSource::default(), 2);
    let len = pool
        .with_instance(|buffer| {
            buffer.extend_from_slice(b"lease");
            Ok(buffer.len())
        })
        .expect("闭包成功时返回其值");
    assert_eq!(len, 5);
    assert_eq!(pool.stats().outstanding, 0);
    assert_eq!(pool.stats().idle, 1);

    let err = pool
        .with_instance(|_| Err::<(), _>(CoreError::new(codes::POOL_EXHAUSTED, "probe")))
        .expect_err("闭包错误透传");
    assert_eq!(err.code(), codes::POOL_EXHAUSTED);
    // 即便闭包失败，实例仍被归还。
    assert_eq!(pool.stats().outstanding, 0);
}

/// 生产失败不得泄漏在途计数。
#[test]
fn failed_production_leaves_no_outstanding_lease() {
    let pool = ObjectPool::new(
        LeaseSource {
            fail_production: true,
            ..LeaseSource::default()
        },
        2,
    );
    let err = pool.borrow().expect_err("来源已枯竭");
    assert_eq!(err.code(), codes::POOL_EXHAUSTED);
    assert_eq!(pool.stats().outstanding, 0);
}

/// 释放幂等；释放后借出被拒绝，迟到的归还就地销毁实例。
#[test]
fn dispose_is_terminal_and_idempotent() {
    let pool = ObjectPool::new(LeaseSource::default(), 2);
    let straggler = pool.borrow().expect("借出");
    pool.dispose();
    pool.dispose();
    assert_eq!(
        pool.borrow().expect_err("释放后不可借出").code(),
        codes::POOL_DISPOSED
    );
    // 迟到归还成功返回，但实例被销毁而非回池。
    pool.recycle(straggler).expect("迟到归还");
    assert_eq!(pool.stats().idle, 0);
}

/// 单实例池：归还前的第二次借出快速失败。
#[test]
fn single_instance_double_borrow_fails_fast() {
    let pool = SingleInstancePool::new(BoxedSource);
    let instance = pool.borrow().expect("唯一实例");
    assert_eq!(
        pool.borrow().expect_err("独占期间再借").code(),
        codes::POOL_EXHAUSTED
    );
    pool.recycle(instance).expect("归还即终结");
    assert!(pool.is_disposed());
    assert_eq!(
        pool.borrow().expect_err("终结后再借").code(),
        codes::POOL_DISPOSED
    );
}

/// 单实例池按地址校验归还身份，陌生实例被拒绝且池状态不变。
#[test]
fn single_instance_identity_is_checked() {
    let pool = SingleInstancePool::new(BoxedSource);
    let genuine = pool.borrow().expect("唯一实例");
    let err = pool
        .recycle(Box::new(Vec::new()))
        .expect_err("陌生实例不得归还");
    assert_eq!(err.code(), codes::POOL_FOREIGN_INSTANCE);
    assert!(!pool.is_disposed());
    pool.recycle(genuine).expect("真实实例照常归还");
    assert!(pool.is_disposed());
}
