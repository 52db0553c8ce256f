use criterion::{criterion_group, criterion_main, Criterion};
use nirvein::{frangi_multiscale, AutoC, Field, MultiScaleParams, ScaleSweep};
use std::hint::black_box;

fn make_field(width: usize, height: usize) -> Field {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let ridge = usize::from(y % 37 < 3 || x % 53 < 2);
            let noise = ((x * 13) ^ (y * 7)) & 0x1F;
            data.push(ridge as f32 * 0.8 + noise as f32 / 255.0);
        }
    }
    Field::from_vec(data, width, height).unwrap()
}

fn bench_multiscale(c: &mut Criterion) {
    let field = make_field(256, 256);

    let single = MultiScaleParams {
        sweep: ScaleSweep::single(1.5),
        beta: 0.5,
        c: 15.0,
        dark_ridges: false,
        auto_c: AutoC::Off,
    };
    c.bench_function("single_scale_256", |b| {
        b.iter(|| black_box(frangi_multiscale(&field, &single).unwrap()));
    });

    let sweep = MultiScaleParams {
        sweep: ScaleSweep {
            sigma_start: 0.5,
            sigma_end: 3.5,
            sigma_step: 0.5,
        },
        beta: 0.5,
        c: 15.0,
        dark_ridges: false,
        auto_c: AutoC::Percentile(75.0),
    };
    c.bench_function("sweep_auto_c_256", |b| {
        b.iter(|| black_box(frangi_multiscale(&field, &sweep).unwrap()));
    });
}

criterion_group!(benches, bench_multiscale);
criterion_main!(benches);
