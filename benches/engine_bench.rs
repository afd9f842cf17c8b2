use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use recalc_core::{DependencyGraph, Engine, ProcessingConfig, RecalcConfig, Session};
use recalc_formulas::Formula;
use recalc_primitives::CellValue;
use recalc_sheet::{Workbook, Worksheet};

fn workbook(rows: usize) -> Workbook {
    let values: Vec<Vec<CellValue>> = (0..rows)
        .map(|i| {
            vec![
                CellValue::Float(i as f64 * 1.5),
                CellValue::Int(i as i64 % 17),
                CellValue::Null,
                CellValue::Null,
            ]
        })
        .collect();
    let formulas = vec![
        vec![
            None,
            None,
            Some("=ROUND(Price*Qty, 2)".to_string()),
            Some("=IF(Total>100, \"high\", \"low\")".to_string()),
        ];
        rows
    ];
    let sheet = Worksheet::from_grid(
        "Orders",
        vec!["Price".into(), "Qty".into(), "Total".into(), "Band".into()],
        values,
        formulas,
    )
    .expect("worksheet");
    [sheet].into_iter().collect()
}

fn prepare(book: &Workbook) -> (DependencyGraph, IndexMap<String, Vec<Formula>>) {
    let mut session = Session::new(RecalcConfig::default());
    let graph = session.build_graph(book).expect("graph");
    let formulas = session.translate(book).expect("formulas").clone();
    (graph, formulas)
}

fn bench_row_wise(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_wise");

    for rows in [1_000, 10_000, 100_000] {
        let book = workbook(rows);
        let tables = book.tables();
        let (graph, formulas) = prepare(&book);

        let sequential = Engine::new(&graph, &formulas, ProcessingConfig::default()).expect("engine");
        group.bench_with_input(BenchmarkId::new("sequential", rows), &tables, |b, tables| {
            b.iter(|| sequential.process(black_box(tables)))
        });

        let config = ProcessingConfig {
            parallel: true,
            chunk_size: 1_000,
            max_workers: 4,
        };
        let parallel = Engine::new(&graph, &formulas, config).expect("engine");
        group.bench_with_input(BenchmarkId::new("parallel", rows), &tables, |b, tables| {
            b.iter(|| parallel.process(black_box(tables)))
        });
    }

    group.finish();
}

fn bench_translate(c: &mut Criterion) {
    let book = workbook(10);
    c.bench_function("translate", |b| {
        b.iter(|| {
            let mut session = Session::new(RecalcConfig::default());
            session.build_graph(black_box(&book)).map(|graph| graph.len())
        })
    });
}

criterion_group!(benches, bench_row_wise, bench_translate);
criterion_main!(benches);
