// one-line parameter file:
//   num_clients num_repeaters rep_coeff gen_coeff client_coeff mean_capacity mean_demand [alpha]

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::quantum_network::{ConfigurationError, FidelityModel, NetworkParams};

pub const DEFAULT_ALPHA:f64 = 1.0;

type Result<T> = std::result::Result<T,ConfigurationError>;

#[derive(Clone,Copy,Debug,PartialEq,Serialize,Deserialize)]
pub struct ExperimentParams {
    pub network:NetworkParams,
    pub alpha:f64,
}

impl Default for ExperimentParams {
    fn default() -> Self {
        Self {network:NetworkParams::default(),alpha:DEFAULT_ALPHA}
    }
}

fn field<T:FromStr>(fields:&mut std::str::SplitWhitespace<'_>,name:&'static str) -> Result<T> {
    let raw = fields.next().ok_or(ConfigurationError::MissingField { field: name })?;
    raw.parse().map_err(|_| ConfigurationError::Unparsable { field: name, value: raw.to_string() })
}

impl ExperimentParams {
    pub fn with_network(mut self,network:NetworkParams) -> Self {
        self.network = network;
        self
    }
    pub fn with_alpha(mut self,alpha:f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.fidelity_model().map(|_| ())
    }
    pub fn fidelity_model(&self) -> Result<FidelityModel> {
        FidelityModel::new(self.alpha)
    }

    pub fn load(path:impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigurationError::ParameterFile { path: path.display().to_string(), source })?;
        text.parse()
    }
}

impl FromStr for ExperimentParams {
    type Err = ConfigurationError;

    fn from_str(s:&str) -> Result<Self> {
        let mut fields = s.split_whitespace();
        let network = NetworkParams {
            num_clients:field(&mut fields, "num_clients")?,
            num_repeaters:field(&mut fields, "num_repeaters")?,
            rep_coeff:field(&mut fields, "rep_coeff")?,
            gen_coeff:field(&mut fields, "gen_coeff")?,
            client_coeff:field(&mut fields, "client_coeff")?,
            mean_capacity:field(&mut fields, "mean_capacity")?,
            mean_demand:field(&mut fields, "mean_demand")?,
        };
        let alpha = match fields.next() {
            Some(raw) => raw.parse().map_err(|_| ConfigurationError::Unparsable { field: "alpha", value: raw.to_string() })?,
            None => DEFAULT_ALPHA,
        };
        let trailing = fields.count();
        if trailing > 0 {
            return Err(ConfigurationError::TrailingFields { count: trailing })
        }
        let params = Self {network,alpha};
        params.validate()?;
        Ok(params)
    }
}

// same layout as the file, alpha always written
impl Display for ExperimentParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = &self.network;
        write!(f,"{} {} {} {} {} {} {} {}",
            n.num_clients,n.num_repeaters,n.rep_coeff,n.gen_coeff,n.client_coeff,
            n.mean_capacity,n.mean_demand,self.alpha)
    }
}
