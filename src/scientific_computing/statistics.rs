use serde::{Deserialize, Serialize};
use thiserror::Error;

// y = a*x^2 + b*x + c
pub type PolyTerms = (f64,f64,f64);

#[derive(Error,Debug,Clone,PartialEq)]
pub enum FitError {
    #[error("quadratic fit needs at least {needed} points, got {got}")]
    TooFewPoints{needed:usize,got:usize},
    #[error("x values are degenerate, normal equations are singular")]
    Degenerate,
}

type Result<T> = std::result::Result<T,FitError>;

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct FitReport {
    pub terms:PolyTerms,
    pub rmse:f64,
    pub r_squared:f64,
}

impl FitReport {
    pub fn predict(&self,x:f64) -> f64 {
        let (a,b,c) = self.terms;
        a*x.powi(2) + b*x + c
    }
}

pub fn mean(data:&[f64]) -> Option<f64> {
    if data.is_empty() {
        return None
    }
    Some(data.iter().sum::<f64>()/data.len() as f64)
}

// least squares through the closed form of the 3x3 normal equations
pub fn quadratic_fit(data:&[(f64,f64)]) -> Result<PolyTerms> {
    if data.len() < 3 {
        return Err(FitError::TooFewPoints { needed: 3, got: data.len() })
    }

    let n = data.len() as f64;

    let mut sum_x = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_x3 = 0.0;
    let mut sum_x4 = 0.0;

    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2y = 0.0;

    for &(xi,yi) in data {
        sum_x += xi;
        sum_x2 += xi.powi(2);
        sum_x3 += xi.powi(3);
        sum_x4 += xi.powi(4);

        sum_y += yi;
        sum_xy += xi*yi;
        sum_x2y += xi.powi(2)*yi;
    }

    let denominator = (n*sum_x2*sum_x4) - (n*sum_x3.powi(2))
        - (sum_x.powi(2)*sum_x4) + (2.0*sum_x*sum_x2*sum_x3)
        - sum_x2.powi(3);

    // relative to the largest product, absolute thresholds break for x in the hundreds
    let scale = (n*sum_x2*sum_x4).abs().max(1.0);
    if denominator.abs() < 1e-12*scale {
        return Err(FitError::Degenerate)
    }

    let coeff_a = (sum_y*(sum_x*sum_x3 - sum_x2.powi(2))
        + sum_xy*(sum_x*sum_x2 - n*sum_x3)
        + sum_x2y*(n*sum_x2 - sum_x.powi(2)))/denominator;

    let coeff_b = (sum_y*(sum_x2*sum_x3 - sum_x*sum_x4)
        + sum_xy*(n*sum_x4 - sum_x2.powi(2))
        + sum_x2y*(sum_x*sum_x2 - n*sum_x3))/denominator;

    let coeff_c = (sum_y*(sum_x2*sum_x4 - sum_x3.powi(2))
        + sum_xy*(sum_x2*sum_x3 - sum_x*sum_x4)
        + sum_x2y*(sum_x*sum_x3 - sum_x2.powi(2)))/denominator;

    Ok((coeff_a,coeff_b,coeff_c))
}

// rmse uses n - 3 degrees of freedom, so one point more than the fit itself
pub fn fit_and_examine(data:&[(f64,f64)]) -> Result<FitReport> {
    if data.len() < 4 {
        return Err(FitError::TooFewPoints { needed: 4, got: data.len() })
    }
    let (a,b,c) = quadratic_fit(data)?;

    let n = data.len() as f64;
    let y_mean = data.iter().map(|(_,y)| y).sum::<f64>()/n;

    let mut rss = 0.0;
    let mut tss = 0.0;
    for &(x,y) in data {
        rss += (y - (a*x.powi(2) + b*x + c)).powi(2);
        tss += (y - y_mean).powi(2);
    }
    let rmse = (rss/(n - 3.0)).sqrt();
    // flat data is fitted exactly by c alone
    let r_squared = if tss == 0.0 {1.0} else {1.0 - rss/tss};
    Ok(FitReport {terms:(a,b,c),rmse,r_squared})
}
