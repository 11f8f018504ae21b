//! パフォーマンスベンチマーク
//!
//! ワークブックはメモリ上で生成し、変換全体と各段階（読み込み・レイアウト・描画）を測定します。
//!
//! 大きな表のベンチマークは時間がかかるため、環境変数 `BENCH_LARGE_FILE=true` を
//! 設定した場合にのみ実行されます。

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_xlsxwriter::{Workbook, XlsxError};
use xlsxpdf::{ConversionSettings, ConverterBuilder, LayoutEngine, PdfRenderer, WorkbookReader};

/// `rows` x `cols`の文字列と数値が混在する表
fn generate_table(rows: u32, cols: u16) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for col in 0..cols {
        worksheet.write_string(0, col, format!("Column {}", col + 1))?;
    }
    for row in 1..rows {
        for col in 0..cols {
            if col % 2 == 0 {
                worksheet.write_string(row, col, format!("R{}C{}", row, col))?;
            } else {
                worksheet.write_number(row, col, f64::from(row) * 1.25 + f64::from(col))?;
            }
        }
    }
    workbook.save_to_buffer()
}

/// 行数ごとの変換全体の時間
fn benchmark_convert(c: &mut Criterion) {
    let converter = ConverterBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("convert");
    group.sample_size(10);

    for rows in [100u32, 1_000, 5_000] {
        let data = generate_table(rows, 10).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| black_box(converter.convert_bytes(black_box(data)).unwrap()));
        });
    }

    group.finish();
}

/// 段階ごとの時間（1,000行 x 20列、ページ分割あり）
fn benchmark_stages(c: &mut Criterion) {
    let data = generate_table(1_000, 20).unwrap();
    let reader = WorkbookReader::new();
    let engine = LayoutEngine::default();
    let renderer = PdfRenderer::new();
    let settings = ConversionSettings {
        fit_to_page: false,
        ..ConversionSettings::default()
    };

    let workbook = reader.parse(&data).unwrap();
    let pages = engine.layout(&workbook, &settings).unwrap();

    let mut group = c.benchmark_group("stages");
    group.sample_size(10);

    group.bench_function("read", |b| {
        b.iter(|| black_box(reader.parse(black_box(&data)).unwrap()));
    });
    group.bench_function("layout", |b| {
        b.iter(|| black_box(engine.layout(black_box(&workbook), &settings).unwrap()));
    });
    group.bench_function("render", |b| {
        b.iter(|| black_box(renderer.render(black_box(&pages)).unwrap()));
    });
    group.bench_function("render_uncompressed", |b| {
        let renderer = PdfRenderer::new().compress_streams(false);
        b.iter(|| black_box(renderer.render(black_box(&pages)).unwrap()));
    });

    group.finish();
}

/// 大きな表（50,000行 x 20列）
fn benchmark_large_table(c: &mut Criterion) {
    if std::env::var("BENCH_LARGE_FILE").is_err() {
        eprintln!("Info: Large table benchmark skipped. Set BENCH_LARGE_FILE=true to enable.");
        return;
    }

    let data = generate_table(50_000, 20).unwrap();
    let converter = ConverterBuilder::new().fit_to_page(false).build().unwrap();

    let mut group = c.benchmark_group("large_table");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(10);

    group.bench_function("convert_50k_rows", |b| {
        b.iter(|| black_box(converter.convert_bytes(black_box(&data)).unwrap()));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(20))
        .warm_up_time(std::time::Duration::from_secs(3));
    targets = benchmark_convert, benchmark_stages
}

criterion_group! {
    name = large_benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(120))
        .warm_up_time(std::time::Duration::from_secs(5));
    targets = benchmark_large_table
}

criterion_main!(benches, large_benches);
