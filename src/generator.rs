// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Generator descriptors and instances as seen by the test algorithms.
//!
//! A [`Generator`] is immutable metadata plus a factory for
//! [`GeneratorInstance`]s. Native algorithms from [`crate::rngs`] are wrapped
//! by [`NativeGenerator`], composed generators by [`Filtered`], which borrows
//! its parent descriptor instead of owning it.

use std::marker::PhantomData;
use std::time::Instant;

use log::info;

use crate::error::{Error, Result};
use crate::rngs::{self, RNG};
use crate::seed::SeedSource;

/// Draws used by the pre-run output width check.
const WIDTH_CHECK_DRAWS: usize = 1000;

/// Private state of one running generator. Never shared between threads.
pub trait GeneratorInstance: Send {
    /// Next output, only the lowest `output_width` bits may be set.
    fn next(&mut self) -> u64;

    /// Wrapping sum of the next `n` outputs.
    fn sum(&mut self, n: usize) -> u64 {
        let mut acc: u64 = 0;
        for _ in 0..n {
            acc = acc.wrapping_add(self.next());
        }
        acc
    }
}

/// Descriptor of a generator: name, output width and a factory.
pub trait Generator: Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// 32 or 64.
    fn output_width(&self) -> u32;

    fn create(&self, seeds: &SeedSource) -> Box<dyn GeneratorInstance>;

    /// Internal consistency check of the algorithm, if it has one.
    fn self_test(&self) -> Option<bool> {
        None
    }

    /// Descriptor this one was composed from.
    fn parent(&self) -> Option<&dyn Generator> {
        None
    }
}

/// A generator instance together with its output width.
/// This is what every test algorithm consumes.
pub struct GeneratorState {
    instance: Box<dyn GeneratorInstance>,
    nbits: u32,
}

impl GeneratorState {
    pub fn new(instance: Box<dyn GeneratorInstance>, nbits: u32) -> Self {
        assert!(
            nbits == 32 || nbits == 64,
            "generator output width must be 32 or 64 bits, got {nbits}"
        );
        GeneratorState { instance, nbits }
    }

    /// Create a fresh instance of `gen`.
    pub fn from_generator(gen: &dyn Generator, seeds: &SeedSource) -> Self {
        GeneratorState::new(gen.create(seeds), gen.output_width())
    }

    #[inline]
    pub fn next(&mut self) -> u64 {
        self.instance.next()
    }

    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    pub fn sum(&mut self, n: usize) -> u64 {
        self.instance.sum(n)
    }
}

struct NativeInstance<R: RNG> {
    rng: R,
    width: u32,
}

impl<R: RNG> GeneratorInstance for NativeInstance<R> {
    #[inline]
    fn next(&mut self) -> u64 {
        if self.width == 32 {
            self.rng.next_u32() as u64
        } else {
            self.rng.next()
        }
    }
}

/// Descriptor for any algorithm implementing [`RNG`].
pub struct NativeGenerator<R> {
    name: &'static str,
    description: &'static str,
    width: u32,
    self_test: Option<fn() -> bool>,
    rng: PhantomData<fn() -> R>,
}

impl<R: RNG + 'static> NativeGenerator<R> {
    pub fn new(name: &'static str, description: &'static str, width: u32) -> Self {
        assert!(width == 32 || width == 64);
        NativeGenerator {
            name,
            description,
            width,
            self_test: None,
            rng: PhantomData,
        }
    }

    pub fn with_self_test(mut self, test: fn() -> bool) -> Self {
        self.self_test = Some(test);
        self
    }
}

impl<R: RNG + 'static> Generator for NativeGenerator<R> {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn output_width(&self) -> u32 {
        self.width
    }

    fn create(&self, seeds: &SeedSource) -> Box<dyn GeneratorInstance> {
        Box::new(NativeInstance {
            rng: R::new(seeds.seed64(self.name)),
            width: self.width,
        })
    }

    fn self_test(&self) -> Option<bool> {
        self.self_test.map(|test| test())
    }
}

/// Output transformations applied on top of a parent generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// Bit order of every output reversed.
    ReversedBits,
    /// 64 bit outputs split into two 32 bit values, lower half first.
    Interleaved,
    /// Upper 32 bits of a 64 bit generator.
    High32,
    /// Lower 32 bits of a 64 bit generator.
    Low32,
}

impl FilterKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "reverse" => Some(FilterKind::ReversedBits),
            "interleave" => Some(FilterKind::Interleaved),
            "high32" => Some(FilterKind::High32),
            "low32" => Some(FilterKind::Low32),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            FilterKind::ReversedBits => "reversed",
            FilterKind::Interleaved => "interleaved32",
            FilterKind::High32 => "high32",
            FilterKind::Low32 => "low32",
        }
    }
}

struct FilteredInstance {
    inner: Box<dyn GeneratorInstance>,
    kind: FilterKind,
    parent_width: u32,
    pending: Option<u32>,
}

impl GeneratorInstance for FilteredInstance {
    fn next(&mut self) -> u64 {
        match self.kind {
            FilterKind::ReversedBits => {
                let x = self.inner.next();
                if self.parent_width == 32 {
                    (x as u32).reverse_bits() as u64
                } else {
                    x.reverse_bits()
                }
            }
            FilterKind::Interleaved => match self.pending.take() {
                Some(hi) => hi as u64,
                None => {
                    let x = self.inner.next();
                    self.pending = Some((x >> 32) as u32);
                    x & 0xffff_ffff
                }
            },
            FilterKind::High32 => self.inner.next() >> 32,
            FilterKind::Low32 => self.inner.next() & 0xffff_ffff,
        }
    }
}

/// Generator composed from a borrowed parent descriptor.
pub struct Filtered<'a> {
    parent: &'a dyn Generator,
    kind: FilterKind,
    name: String,
}

impl<'a> Filtered<'a> {
    pub fn new(parent: &'a dyn Generator, kind: FilterKind) -> Result<Self> {
        if kind != FilterKind::ReversedBits && parent.output_width() != 64 {
            return Err(Error::InvalidOption {
                test: parent.name().to_owned(),
                option: "filter".to_owned(),
                reason: format!("'{}' needs a 64-bit generator", kind.suffix()),
            });
        }
        Ok(Filtered {
            parent,
            kind,
            name: format!("{}:{}", parent.name(), kind.suffix()),
        })
    }
}

impl Generator for Filtered<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        self.parent.description()
    }

    fn output_width(&self) -> u32 {
        match self.kind {
            FilterKind::ReversedBits => self.parent.output_width(),
            _ => 32,
        }
    }

    fn create(&self, seeds: &SeedSource) -> Box<dyn GeneratorInstance> {
        Box::new(FilteredInstance {
            inner: self.parent.create(seeds),
            kind: self.kind,
            parent_width: self.parent.output_width(),
            pending: None,
        })
    }

    fn self_test(&self) -> Option<bool> {
        self.parent.self_test()
    }

    fn parent(&self) -> Option<&dyn Generator> {
        Some(self.parent)
    }
}

/// Wrap `base` in the filter named `filter`, if any.
/// A filter without a generator to apply it to is an error.
pub fn resolve_filter<'a>(
    base: Option<&'a dyn Generator>,
    filter: Option<&str>,
) -> Result<Option<Filtered<'a>>> {
    let Some(filter) = filter else {
        return Ok(None);
    };
    let invalid = |test: &str, reason: String| Error::InvalidOption {
        test: test.to_owned(),
        option: "filter".to_owned(),
        reason,
    };
    let Some(base) = base else {
        return Err(invalid("none", format!("'{filter}' needs a generator")));
    };
    let kind = FilterKind::from_name(filter)
        .ok_or_else(|| invalid(base.name(), format!("unknown filter '{filter}'")))?;
    Filtered::new(base, kind).map(Some)
}

/// State of a native algorithm seeded directly, for unit tests.
#[cfg(test)]
pub(crate) fn native_state<R: RNG + 'static>(seed: u64, width: u32) -> GeneratorState {
    GeneratorState::new(Box::new(NativeInstance { rng: R::new(seed), width }), width)
}

/// Rejects 32 bit generators that emit anything in the upper half.
pub fn check_output_width(gen: &dyn Generator, seeds: &SeedSource) -> Result<()> {
    if gen.output_width() == 64 {
        return Ok(());
    }
    let mut instance = gen.create(seeds);
    for _ in 0..WIDTH_CHECK_DRAWS {
        if instance.next() >> 32 != 0 {
            return Err(Error::GeneratorOutputWidth {
                name: gen.name().to_owned(),
                width: gen.output_width(),
            });
        }
    }
    Ok(())
}

/// Generator throughput in bytes per second, measured with batched sums.
pub fn measure_speed(gen: &dyn Generator, seeds: &SeedSource, nvalues: usize) -> f64 {
    let mut instance = gen.create(seeds);
    let start = Instant::now();
    let sum = instance.sum(nvalues);
    let elapsed = start.elapsed().as_secs_f64().max(1e-9);
    info!("{}: sum of {} outputs = {:#018x}", gen.name(), nvalues, sum);
    (nvalues as f64) * (gen.output_width() as f64 / 8.0) / elapsed
}

/// All built-in generators.
pub fn builtin_generators() -> Vec<Box<dyn Generator>> {
    vec![
        Box::new(NativeGenerator::<rngs::ReferenceRand>::new(
            "chacha",
            "ChaCha12 stream cipher from the rand crate",
            64,
        )),
        Box::new(
            NativeGenerator::<rngs::stream_nlarx::StreamNLARXu128>::new(
                "stream_nlarx",
                "Counter based ARX mixer with seek",
                64,
            )
            .with_self_test(rngs::stream_nlarx::StreamNLARXu128::self_test),
        ),
        Box::new(NativeGenerator::<rngs::xorshift::XORShift128>::new(
            "xorshift128",
            "Marsaglia xorshift128",
            32,
        )),
        Box::new(NativeGenerator::<rngs::lcg::Randu>::new(
            "randu",
            "IBM RANDU LCG, two outputs combined",
            32,
        )),
        Box::new(NativeGenerator::<rngs::lcg::Lcg69069>::new(
            "lcg69069",
            "32-bit LCG with multiplier 69069",
            32,
        )),
        Box::new(NativeGenerator::<rngs::lcg::Mmix>::new(
            "mmix",
            "Knuth MMIX 64-bit LCG",
            64,
        )),
        Box::new(NativeGenerator::<rngs::lcg::Lehmer64>::new(
            "lehmer64",
            "128-bit multiplicative LCG, upper 64 bits",
            64,
        )),
        Box::new(NativeGenerator::<rngs::testgens::OnlyZero>::new(
            "zero",
            "Always returns 0",
            64,
        )),
        Box::new(NativeGenerator::<rngs::testgens::OnlyOne>::new(
            "ones",
            "Always returns all bits set",
            64,
        )),
        Box::new(NativeGenerator::<rngs::testgens::AlternatingBlocks>::new(
            "alternating_blocks",
            "Alternates between all zero and all one outputs",
            64,
        )),
        Box::new(NativeGenerator::<rngs::testgens::AlternatingBytes>::new(
            "alternating_bytes",
            "Constant 0xff00ff00... pattern",
            64,
        )),
    ]
}

/// Look up a built-in generator by name.
pub fn find_generator(name: &str) -> Result<Box<dyn Generator>> {
    builtin_generators()
        .into_iter()
        .find(|g| g.name() == name)
        .ok_or_else(|| Error::UnknownGenerator(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);
    impl GeneratorInstance for Counter {
        fn next(&mut self) -> u64 {
            self.0 += 1;
            self.0
        }
    }

    struct Wide;
    impl Generator for Wide {
        fn name(&self) -> &str {
            "wide"
        }
        fn output_width(&self) -> u32 {
            32
        }
        fn create(&self, _seeds: &SeedSource) -> Box<dyn GeneratorInstance> {
            Box::new(Counter(u32::MAX as u64 - 10))
        }
    }

    #[test]
    fn catalogue_names_are_unique() {
        let gens = builtin_generators();
        let mut names: Vec<&str> = gens.iter().map(|g| g.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), gens.len());
        assert!(find_generator("nope").is_err());
    }

    #[test]
    fn builtin_32bit_generators_pass_width_check() {
        let seeds = SeedSource::from_seed(3);
        for gen in builtin_generators() {
            check_output_width(gen.as_ref(), &seeds).unwrap();
        }
    }

    #[test]
    fn width_check_rejects_overflowing_generator() {
        let seeds = SeedSource::from_seed(3);
        match check_output_width(&Wide, &seeds) {
            Err(Error::GeneratorOutputWidth { width, .. }) => assert_eq!(width, 32),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn interleaved_splits_words_low_half_first() {
        let parent = find_generator("mmix").unwrap();
        let seeds_a = SeedSource::from_seed(9);
        let seeds_b = SeedSource::from_seed(9);
        let filtered = Filtered::new(parent.as_ref(), FilterKind::Interleaved).unwrap();
        assert_eq!(filtered.output_width(), 32);
        assert_eq!(filtered.parent().map(|p| p.name()), Some("mmix"));
        let mut raw = parent.create(&seeds_a);
        let mut split = filtered.create(&seeds_b);
        for _ in 0..10 {
            let x = raw.next();
            assert_eq!(split.next(), x & 0xffff_ffff);
            assert_eq!(split.next(), x >> 32);
        }
    }

    #[test]
    fn reversed_bits_keeps_width() {
        let parent = find_generator("xorshift128").unwrap();
        let filtered = Filtered::new(parent.as_ref(), FilterKind::ReversedBits).unwrap();
        let mut a = parent.create(&SeedSource::from_seed(2));
        let mut b = filtered.create(&SeedSource::from_seed(2));
        for _ in 0..10 {
            assert_eq!(b.next(), (a.next() as u32).reverse_bits() as u64);
        }
        assert!(Filtered::new(parent.as_ref(), FilterKind::High32).is_err());
    }

    #[test]
    fn filter_needs_a_generator() {
        assert!(matches!(resolve_filter(None, None), Ok(None)));
        match resolve_filter(None, Some("high32")) {
            Err(Error::InvalidOption { option, .. }) => assert_eq!(option, "filter"),
            Err(e) => panic!("unexpected {e:?}"),
            Ok(_) => panic!("filter without generator accepted"),
        }
        let parent = find_generator("mmix").unwrap();
        let filtered = resolve_filter(Some(parent.as_ref()), Some("low32")).unwrap();
        assert_eq!(filtered.map(|f| f.name().to_owned()).as_deref(), Some("mmix:low32"));
        assert!(resolve_filter(Some(parent.as_ref()), Some("middle32")).is_err());
    }

    #[test]
    fn self_test_is_forwarded() {
        let gen = find_generator("stream_nlarx").unwrap();
        assert_eq!(gen.self_test(), Some(true));
        assert_eq!(find_generator("zero").unwrap().self_test(), None);
    }
}
