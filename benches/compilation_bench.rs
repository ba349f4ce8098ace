//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shortcss::*;
use std::fs;
use tempfile::TempDir;

const SAMPLE: &str = r#"
@scope app

@keyframe fade {
  from(op[0])
  to(op[1])
}

@const card-base {
  p[16px] br[8px]
  bg[white]
}

.card {
  @use card-base
  --&gap[12px]
  $c[black]
  gap[--&gap]
  an[fade 200ms]
  hover(bg[#f5f5f5])
  screen(min[768px], p[24px])
  @query .title { fs[18px] fw[600] }
  @query @scope.badge { ml[--&gap] }
}

.badge { d[inline-block] px[4px] }
"#;

fn bench_simple_compilation(c: &mut Criterion) {
    c.bench_function("simple_compilation", |b| {
        b.iter(|| compile_source(black_box(".box { bg[red] p[4px] hover(bg[blue]) }"), "bench.scs").unwrap())
    });
}

fn bench_sample_compilation(c: &mut Criterion) {
    c.bench_function("sample_compilation", |b| {
        b.iter(|| compile_source(black_box(SAMPLE), "bench.scs").unwrap())
    });
}

fn bench_large_file_compilation(c: &mut Criterion) {
    let mut content = String::from("@scope large\n");
    for i in 0..1000 {
        content.push_str(&format!(
            ".item-{i} {{ $bg[#{:06x}] p[{}px] hover(op[0.8]) @query .label {{ c[red] }} }}\n",
            i * 97 % 0xffffff,
            i % 32
        ));
    }

    c.bench_function("large_file_compilation", |b| {
        b.iter(|| compile_source(black_box(&content), "large.scs").unwrap())
    });
}

fn bench_file_compilation(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("sample.scs");
    let output_path = temp_dir.path().join("sample.css");
    fs::write(&input_path, SAMPLE).unwrap();

    c.bench_function("file_compilation", |b| {
        b.iter(|| {
            compile_file(
                black_box(input_path.to_str().unwrap()),
                black_box(output_path.to_str().unwrap()),
            )
            .unwrap()
        })
    });
}

fn bench_output_styles(c: &mut Criterion) {
    let theme = Theme::empty();
    let mut group = c.benchmark_group("output_styles");

    for (label, style) in [("compact", OutputStyle::Compact), ("pretty", OutputStyle::Pretty)] {
        group.bench_function(label, |b| {
            b.iter(|| {
                let options = CompilerOptions {
                    output_style: style,
                    ..Default::default()
                };
                compile_source_with_options(black_box(SAMPLE), "bench.scs", &theme, options).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_simple_compilation,
    bench_sample_compilation,
    bench_large_file_compilation,
    bench_file_compilation,
    bench_output_styles
);
criterion_main!(benches);
