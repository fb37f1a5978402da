use std::sync::Arc;

/// Regularizes the denominator of the Emax model at `C = EC50 = 0`
pub const EC50_EPSILON: f64 = 1e-12;

/// Emax model, `E = Emax C / (C + EC50)`
///
/// Monotone non-decreasing in `C`, zero at `C = 0` and saturating at `e_max`.
#[inline(always)]
pub fn e_of_c(c: f64, e_max: f64, ec50: f64) -> f64 {
    e_max * c / (c + ec50 + EC50_EPSILON)
}

/// A time-varying cytotoxic effect, the fractional kill rate added to the
/// natural death rate of viable tumor cells
///
/// Effects of drugs given together are summed. This is a modelling
/// assumption, not a pharmacological law.
pub trait EffectSignal: Send + Sync {
    fn effect(&self, t: f64) -> f64;
}

/// No treatment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEffect;

impl EffectSignal for NoEffect {
    fn effect(&self, _t: f64) -> f64 {
        0.0
    }
}

/// Constant effect, mostly useful for checking the tumor model
#[derive(Debug, Clone, Copy)]
pub struct ConstantEffect(pub f64);

impl EffectSignal for ConstantEffect {
    fn effect(&self, _t: f64) -> f64 {
        self.0
    }
}

/// Wraps any closure of time
pub struct FnEffect<F>(pub F);

impl<F> EffectSignal for FnEffect<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn effect(&self, t: f64) -> f64 {
        (self.0)(t)
    }
}

impl<E: EffectSignal + ?Sized> EffectSignal for &E {
    fn effect(&self, t: f64) -> f64 {
        (**self).effect(t)
    }
}

impl<E: EffectSignal + ?Sized> EffectSignal for Arc<E> {
    fn effect(&self, t: f64) -> f64 {
        (**self).effect(t)
    }
}

impl<E: EffectSignal + ?Sized> EffectSignal for Box<E> {
    fn effect(&self, t: f64) -> f64 {
        (**self).effect(t)
    }
}
