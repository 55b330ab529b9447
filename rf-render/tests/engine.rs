use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use image::{Rgba, RgbaImage};
use rf_core::{
    mandelbrot::Mandelbrot, newton::Newton, CoordinateTransform, Decimal, EscapeTime, Formula,
    FormulaError, HuePalette, PixelCalculator, PointCalculator, StandardFactory, Viewport,
};
use rf_render::{
    persist, Consumer, Persist, ProgressiveRefinement, ProgressiveRefinementConsumer,
    Production, RasterScan, RasterScanConsumer, RunState, Schedule, Workers,
};

const WIDTH: u32 = 17;
const HEIGHT: u32 = 13;
const WORKERS: usize = 4;
const ITERS: u32 = 32;

fn d(text: &str) -> Decimal {
    text.parse().unwrap()
}

/// Odd sizes put the center pixel, (8, 6), on the origin.
fn viewport() -> Arc<Viewport<f64>> {
    Arc::new(
        Viewport::new(d("-1.7")..d("1.7"), d("-1.3")..d("1.3"), WIDTH, HEIGHT).unwrap(),
    )
}

/// Counts how often each pixel is computed, optionally slowly.
#[derive(Clone)]
struct Counting {
    inner: EscapeTime,
    counts: Arc<Vec<AtomicU32>>,
    delay: Duration,
}

impl Counting {
    fn new(delay: Duration) -> Self {
        Counting {
            inner: EscapeTime::new(ITERS),
            counts: Arc::new((0..WIDTH * HEIGHT).map(|_| AtomicU32::new(0)).collect()),
            delay,
        }
    }

    fn counts(&self) -> Vec<u32> {
        self.counts.iter().map(|c| c.load(Ordering::SeqCst)).collect()
    }

    fn total(&self) -> u32 {
        self.counts().iter().sum()
    }
}

impl PointCalculator<f64> for Counting {
    fn new_instance(&self) -> Box<dyn PointCalculator<f64>> {
        Box::new(self.clone())
    }

    fn compute(
        &mut self,
        x: u32,
        y: u32,
        transform: &dyn CoordinateTransform<f64>,
        formula: &mut dyn Formula<f64>,
    ) -> Result<i32, FormulaError> {
        self.counts[(y * WIDTH + x) as usize].fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        PointCalculator::<f64>::compute(&mut self.inner, x, y, transform, formula)
    }
}

/// Every pixel computed directly, on this thread.
fn reference(template: &dyn Formula<f64>) -> Vec<Result<i32, FormulaError>> {
    let transform = viewport();
    let mut formula = template.new_instance();
    formula
        .cache_constants(&StandardFactory::<f64>::new())
        .unwrap();
    let mut calculator = EscapeTime::new(ITERS);
    (0..HEIGHT)
        .flat_map(|y| (0..WIDTH).map(move |x| (x, y)))
        .map(|(x, y)| {
            PointCalculator::<f64>::compute(
                &mut calculator,
                x,
                y,
                transform.as_ref(),
                formula.as_mut(),
            )
        })
        .collect()
}

fn new_production<S: Schedule>(
    schedule: S,
    formula: Box<dyn Formula<f64>>,
    calculator: &Counting,
) -> Production<f64, S> {
    Production::new(
        schedule,
        Arc::new(StandardFactory::<f64>::new()),
        formula,
        Box::new(calculator.clone()),
        viewport(),
    )
}

fn assert_matches_reference<S: Schedule>(production: &Production<f64, S>) {
    let expected = reference(&Mandelbrot::<f64>::new());
    for (index, value) in expected.into_iter().enumerate() {
        assert_eq!(production.image().get_index(index), value.unwrap(), "pixel {index}");
    }
}

fn colors(palette: &HuePalette, raws: impl Iterator<Item = i32>) -> Vec<Rgba<u8>> {
    let mut palette = palette.new_instance();
    raws.map(|raw| palette.color(raw)).collect()
}

#[test]
fn raster_scan_with_a_live_consumer() {
    let calculator = Counting::new(Duration::from_micros(200));
    let schedule = RasterScan::new(WIDTH, HEIGHT, WORKERS).unwrap();
    let palette = HuePalette::default();
    let mut consumer = RasterScanConsumer::new(&schedule, &palette);
    let production = new_production(schedule, Box::new(Mandelbrot::<f64>::new()), &calculator);
    let expected = reference(&Mandelbrot::<f64>::new());
    let expected_colors = colors(&palette, expected.iter().map(|v| *v.as_ref().unwrap()));

    let unpainted = Rgba([0, 0, 0, 0]);
    let mut target = RgbaImage::from_pixel(WIDTH, HEIGHT, unpainted);
    let workers = Workers::spawn(production.producers()).unwrap();
    loop {
        let finished = workers.is_finished();
        consumer.consume(&mut target).unwrap();
        // Whatever is painted is final.
        for (index, pixel) in target.pixels().enumerate() {
            if *pixel != unpainted {
                assert_eq!(*pixel, expected_colors[index], "pixel {index}");
            }
        }
        if finished {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    for finished in workers.join().unwrap() {
        assert_eq!(finished.outcome, Ok(RunState::Complete));
    }
    consumer.consume(&mut target).unwrap();

    assert!(consumer.is_complete());
    assert_eq!(consumer.percentages(), [100; WORKERS]);
    assert_eq!(target.pixels().copied().collect::<Vec<_>>(), expected_colors);
    assert!(calculator.counts().iter().all(|n| *n == 1));
    assert_matches_reference(&production);
}

#[test]
fn refinement_computes_every_pixel() {
    let calculator = Counting::new(Duration::ZERO);
    let schedule = ProgressiveRefinement::new(WIDTH, HEIGHT, 3, WORKERS).unwrap();
    let palette = HuePalette::default();
    let mut consumer = ProgressiveRefinementConsumer::new(&schedule, &palette);
    let production = new_production(schedule, Box::new(Mandelbrot::<f64>::new()), &calculator);

    let workers = Workers::spawn(production.producers()).unwrap();
    let mut target = RgbaImage::new(WIDTH, HEIGHT);
    while !workers.is_finished() {
        consumer.consume(&mut target).unwrap();
        thread::yield_now();
    }
    for finished in workers.join().unwrap() {
        assert_eq!(finished.outcome, Ok(RunState::Complete));
    }
    consumer.consume(&mut target).unwrap();

    assert!(consumer.is_complete());
    assert_eq!(consumer.percentages(), [100; WORKERS]);
    assert_matches_reference(&production);
    let expected = reference(&Mandelbrot::<f64>::new());
    let expected_colors = colors(&palette, expected.iter().map(|v| *v.as_ref().unwrap()));
    assert_eq!(target.pixels().copied().collect::<Vec<_>>(), expected_colors);

    // Once per pass whose grid holds the pixel.
    let counts = calculator.counts();
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let passes = [4, 2, 1].iter().filter(|c| x % *c == 0 && y % *c == 0).count();
            assert_eq!(counts[(y * WIDTH + x) as usize], passes as u32, "({x}, {y})");
        }
    }
}

#[test]
fn one_failing_point_is_skipped() {
    let calculator = Counting::new(Duration::ZERO);
    let schedule = RasterScan::new(WIDTH, HEIGHT, WORKERS).unwrap();
    let production = new_production(schedule, Box::new(Newton::<f64>::new()), &calculator);

    let finished = Workers::spawn(production.producers())
        .unwrap()
        .join()
        .unwrap();
    assert!(production.is_complete());

    let center = (6 * WIDTH + 8) as usize;
    let expected = reference(&Newton::<f64>::new());
    for (index, value) in expected.iter().enumerate() {
        if index == center {
            assert!(value.is_err());
            assert_eq!(production.image().get_index(index), 0);
        } else {
            assert_eq!(production.image().get_index(index), *value.as_ref().unwrap());
        }
    }
    for result in finished {
        assert_eq!(result.outcome, Ok(RunState::Complete));
        let log: Vec<_> = result.producer.log().collect();
        if result.producer.worker() == center % WORKERS {
            assert_eq!(log.len(), 1);
            assert!(log[0].contains("(8, 6)"));
        } else {
            assert!(log.is_empty());
        }
    }
    assert!(calculator.counts().iter().all(|n| *n == 1));
}

#[test]
fn failing_point_is_skipped_between_passes() {
    let calculator = Counting::new(Duration::ZERO);
    let schedule = ProgressiveRefinement::new(WIDTH, HEIGHT, 3, WORKERS).unwrap();
    let production = new_production(schedule, Box::new(Newton::<f64>::new()), &calculator);

    let finished = Workers::spawn(production.producers())
        .unwrap()
        .join()
        .unwrap();
    assert!(production.is_complete());

    let center = (6 * WIDTH + 8) as usize;
    let expected = reference(&Newton::<f64>::new());
    for (index, value) in expected.iter().enumerate() {
        if index == center {
            assert!(value.is_err());
            assert_eq!(production.image().get_index(index), 0);
        } else {
            assert_eq!(production.image().get_index(index), *value.as_ref().unwrap());
        }
    }
    // (8, 6) is cell 31 of the chunk-2 pass and cell 110 of the last one.
    for result in finished {
        assert_eq!(result.outcome, Ok(RunState::Complete));
        let log: Vec<_> = result.producer.log().collect();
        match result.producer.worker() {
            2 | 3 => {
                assert_eq!(log.len(), 1);
                assert!(log[0].contains("(8, 6)"));
            }
            _ => assert!(log.is_empty()),
        }
    }
    assert_eq!(calculator.counts()[center], 2);
}

/// Interrupts once some points are done, then waits for the workers.
fn interrupt_midway<S: Schedule>(
    production: &Production<f64, S>,
    calculator: &Counting,
) -> Vec<rf_render::Finished<f64, S>> {
    let workers = Workers::spawn(production.producers()).unwrap();
    while calculator.total() < 40 && !workers.is_finished() {
        thread::yield_now();
    }
    production.interrupt();
    workers.join().unwrap()
}

#[test]
fn resumes_in_place_after_an_interrupt() {
    let calculator = Counting::new(Duration::from_micros(300));
    let schedule = ProgressiveRefinement::new(WIDTH, HEIGHT, 3, WORKERS).unwrap();
    let production = new_production(schedule, Box::new(Mandelbrot::<f64>::new()), &calculator);

    let finished = interrupt_midway(&production, &calculator);
    production.resume();
    let producers = finished.into_iter().map(|f| f.producer).collect();
    for finished in Workers::spawn(producers).unwrap().join().unwrap() {
        assert_eq!(finished.outcome, Ok(RunState::Complete));
    }

    assert!(production.is_complete());
    assert_matches_reference(&production);
    let counts = calculator.counts();
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let passes = [4, 2, 1].iter().filter(|c| x % *c == 0 && y % *c == 0).count();
            assert_eq!(counts[(y * WIDTH + x) as usize], passes as u32, "({x}, {y})");
        }
    }
}

fn resume_from_stream<S: Persist>(first: S, second: S) {
    let calculator = Counting::new(Duration::from_micros(300));
    let production = new_production(first, Box::new(Mandelbrot::<f64>::new()), &calculator);
    interrupt_midway(&production, &calculator);
    let mut bytes = Vec::new();
    persist::save(production.schedule().as_ref(), &mut bytes).unwrap();

    // A new process: nothing but the stream carries over.
    persist::load(&second, bytes.as_slice()).unwrap();
    let production = new_production(second, Box::new(Mandelbrot::<f64>::new()), &calculator);
    Workers::spawn(production.producers())
        .unwrap()
        .join()
        .unwrap();

    assert!(production.is_complete());
    assert_matches_reference(&production);
}

#[test]
fn raster_scan_resumes_from_a_checkpoint() {
    resume_from_stream(
        RasterScan::new(WIDTH, HEIGHT, WORKERS).unwrap(),
        RasterScan::new(WIDTH, HEIGHT, WORKERS).unwrap(),
    );
}

#[test]
fn refinement_resumes_from_a_checkpoint() {
    resume_from_stream(
        ProgressiveRefinement::new(WIDTH, HEIGHT, 3, WORKERS).unwrap(),
        ProgressiveRefinement::new(WIDTH, HEIGHT, 3, WORKERS).unwrap(),
    );
}

#[test]
fn resuming_never_recomputes_a_point() {
    let calculator = Counting::new(Duration::from_micros(300));
    let schedule = RasterScan::new(WIDTH, HEIGHT, WORKERS).unwrap();
    let production = new_production(schedule, Box::new(Mandelbrot::<f64>::new()), &calculator);
    interrupt_midway(&production, &calculator);
    let mut bytes = Vec::new();
    persist::save(production.schedule().as_ref(), &mut bytes).unwrap();

    let restored = RasterScan::new(WIDTH, HEIGHT, WORKERS).unwrap();
    persist::load(&restored, bytes.as_slice()).unwrap();
    let production = new_production(restored, Box::new(Mandelbrot::<f64>::new()), &calculator);
    Workers::spawn(production.producers())
        .unwrap()
        .join()
        .unwrap();
    assert!(calculator.counts().iter().all(|n| *n == 1));
}

#[test]
fn setup_failures_stop_every_worker() {
    let calculator = Counting::new(Duration::ZERO);
    let schedule = ProgressiveRefinement::new(WIDTH, HEIGHT, 3, WORKERS).unwrap();
    let production = new_production(schedule, Box::new(Mandelbrot::<f64>::new()), &calculator)
        .with_julia(d("1e400"), d("0"));
    let finished = Workers::spawn(production.producers())
        .unwrap()
        .join()
        .unwrap();
    for result in finished {
        assert!(result.outcome.is_err());
        assert!(!result.producer.is_complete());
    }
    assert_eq!(calculator.total(), 0);
}
