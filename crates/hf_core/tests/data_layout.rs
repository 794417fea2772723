// crates/hf_core/tests/data_layout.rs

//! 数据布局层端到端测试
//!
//! 模拟一个时间步的数据通路：状态矩阵组轮换、界面视图聚集、
//! 跨进程打包/散布经由内核队列执行。

use std::sync::Arc;

use parking_lot::Mutex;

use hf_core::prelude::*;
use hf_core::view::ViewLike;

/// 两个单元块共享一个分配区，各 3 行（自由度）x 4 列（单元）
fn setup_element_blocks(backend: &CpuBackend) -> Vec<Matrix<CpuBackend>> {
    let shape = IoShape::new(&[3, 4]).unwrap();
    let mats = Matrix::alloc_group(
        backend,
        &[(DType::F64, shape.clone()), (DType::F64, shape)],
        TagSet::new(),
    )
    .unwrap();

    for (k, m) in mats.iter().enumerate() {
        let data: Vec<f64> = (0..12).map(|j| (k * 1000 + j) as f64).collect();
        m.set(&data).unwrap();
    }
    mats
}

#[test]
fn test_double_buffered_time_stepping() {
    let backend = CpuBackend::new();
    let shape = IoShape::new(&[3, 4]).unwrap();

    let old = Matrix::alloc(&backend, DType::F64, shape.clone(), TagSet::new()).unwrap();
    let new = Matrix::alloc(&backend, DType::F64, shape, TagSet::new()).unwrap();
    old.set(&vec![1.0f64; 12]).unwrap();
    new.set(&vec![2.0f64; 12]).unwrap();

    let mut bank = MatrixBank::new(&backend, vec![old, new], 0, TagSet::new()).unwrap();

    // 两级缓冲轮换若干步：活动成员交替，无数据搬运
    for step in 0..4 {
        assert_eq!(bank.active(), step % 2);
        let expected = (step % 2 + 1) as f64;
        assert_eq!(bank.get::<f64>().unwrap(), vec![expected; 12]);
        bank.set_active((step + 1) % 2).unwrap();
    }
}

#[test]
fn test_face_coupling_gather() {
    let backend = CpuBackend::new();
    let mats = setup_element_blocks(&backend);

    // 每个界面点从两个单元块各取一个自由度
    let matmap = [&mats[0], &mats[1], &mats[0], &mats[1]];
    let rcmap = [[0, 0], [0, 3], [2, 1], [1, 2]];
    let stridemap = [[0, 0]; 4];

    let view = View::new(
        &backend,
        &matmap,
        &rcmap,
        &stridemap,
        ViewShape::default(),
        TagSet::new(),
    )
    .unwrap();

    assert_eq!(view.n(), 4);
    // 位移公式: offset + row*leaddim + col
    let expected: Vec<i32> = matmap
        .iter()
        .zip(rcmap)
        .map(|(m, [r, c])| (m.offset() as i32) + r * (m.leaddim() as i32) + c)
        .collect();
    assert_eq!(view.mapping(), &expected[..]);
}

#[test]
fn test_exchange_cycle_through_queue() {
    let backend = CpuBackend::new();
    let mats = setup_element_blocks(&backend);

    let mv = MpiView::new(
        &backend,
        &[&mats[0], &mats[1]],
        &[[1, 0], [2, 3]],
        &[[0, 0]; 2],
        ViewShape::default(),
        TagSet::new(),
    )
    .unwrap();

    let mut queue = HostQueue::new();
    queue.enqueue([mv.pack_kernel()]);
    queue.run_sync([]).unwrap();

    // 块 0 的 (1,0) = 4, 块 1 的 (2,3) = 1011
    assert_eq!(mv.get::<f64>().unwrap(), vec![4.0, 1011.0]);

    // 模拟收到邻进程数据后散布回去
    mv.set(&[-4.0f64, -1011.0]).unwrap();
    queue.run_sync([mv.unpack_kernel()]).unwrap();
    assert_eq!(mats[0].get::<f64>().unwrap()[4], -4.0);
    assert_eq!(mats[1].get::<f64>().unwrap()[11], -1011.0);
    assert!(queue.is_empty());
}

#[test]
fn test_step_pipeline_ordering() {
    // 一个时间步里: 先打包交换数据, 再执行通量内核, 顺序必须保持
    let backend = CpuBackend::new();
    let mats = setup_element_blocks(&backend);

    let mv = MpiView::new(
        &backend,
        &[&mats[0]],
        &[[0, 0]],
        &[[0, 0]],
        ViewShape::default(),
        TagSet::new(),
    )
    .unwrap();

    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let observe = |name: &'static str| {
        let log = log.clone();
        KernelUnit::new(name, move || {
            log.lock().push(name);
            Ok(())
        })
    };

    let mut queue = HostQueue::new();
    queue.enqueue([mv.pack_kernel(), observe("exchange")]);
    queue
        .run_sync([observe("flux"), observe("update")])
        .unwrap();

    assert_eq!(*log.lock(), vec!["exchange", "flux", "update"]);
    assert!(queue.is_empty());
}

#[test]
fn test_slice_and_bank_composition_limits() {
    let backend = CpuBackend::new();
    let mats = setup_element_blocks(&backend);

    // 切片继承布局, 组拒绝切片, 切片拒绝再切片
    let s = mats[0].rslice(1, 3).unwrap();
    assert_eq!(s.pitch(), mats[0].pitch());
    assert!(s.rslice(0, 1).is_err());

    let mats2: Vec<_> = (0..2)
        .map(|_| {
            Matrix::alloc(
                &backend,
                DType::F64,
                IoShape::new(&[3, 4]).unwrap(),
                TagSet::new(),
            )
            .unwrap()
        })
        .collect();
    let bank = MatrixBank::new(&backend, mats2, 0, TagSet::new()).unwrap();
    assert!(bank.rslice(0, 1).is_err());
}

#[test]
fn test_const_operator_matrix_in_setup() {
    let backend = CpuBackend::new();

    // 插值算子矩阵: 装配期写入一次, 此后只读
    let op = ConstMatrix::alloc_init(
        &backend,
        IoShape::new(&[2, 3]).unwrap(),
        &[1.0f64, 0.5, 0.0, 0.0, 0.5, 1.0],
        TagSet::new(),
    )
    .unwrap();

    assert!(op.tags().contains(Tag::Const));
    assert!(op.as_matrix().set(&[0.0f64; 6]).is_err());
    assert_eq!(op.get::<f64>().unwrap()[1], 0.5);
}
