use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Uniform;

/// Inverted dropout for regularization
///
/// During training each activation is zeroed with probability `dropout_rate`
/// and survivors are scaled by 1 / (1 - rate), so evaluation mode is the
/// identity. Masks come from an owned, seeded RNG to keep training runs
/// reproducible.
#[derive(Clone, Debug)]
pub struct Dropout {
    pub dropout_rate: f64,
    pub is_training: bool,
    rng: StdRng,
    mask: Option<Array2<f64>>,
}

impl Dropout {
    pub fn new(dropout_rate: f64, seed: u64) -> Self {
        assert!((0.0..1.0).contains(&dropout_rate),
                "Dropout rate must be in [0.0, 1.0)");

        Dropout {
            dropout_rate,
            is_training: true,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        }
    }

    pub fn train(&mut self) {
        self.is_training = true;
    }

    pub fn eval(&mut self) {
        self.is_training = false;
        self.mask = None;
    }

    pub fn forward(&mut self, input: &Array2<f64>) -> Array2<f64> {
        if !self.is_training || self.dropout_rate == 0.0 {
            self.mask = None;
            return input.clone();
        }

        let keep_prob = 1.0 - self.dropout_rate;
        let mask = Array2::random_using(input.raw_dim(), Uniform::new(0.0, 1.0), &mut self.rng)
            .mapv(|x: f64| if x < keep_prob { 1.0 / keep_prob } else { 0.0 });

        let output = input * &mask;
        self.mask = Some(mask);
        output
    }

    pub fn backward(&self, grad_output: &Array2<f64>) -> Array2<f64> {
        match self.mask {
            Some(ref mask) => grad_output * mask,
            None => grad_output.clone(),
        }
    }
}
