// append-only csv of sweep results, one row per sweep point.
// empty cells stand for a missing objective or gap

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::optimization::SolveStatus;

pub const HEADER:&str = "value,lp_objective,mip_objective,gap,lp_seconds,mip_seconds,status";

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
pub struct ResultRow {
    // the swept parameter's value at this point
    pub value:f64,
    pub lp_objective:Option<f64>,
    pub mip_objective:Option<f64>,
    pub gap:Option<f64>,
    pub lp_seconds:f64,
    pub mip_seconds:f64,
    pub status:SolveStatus,
}

fn cell(value:Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ResultRow {
    pub fn to_csv(&self) -> String {
        format!("{},{},{},{},{},{},{}",
            self.value,
            cell(self.lp_objective),
            cell(self.mip_objective),
            cell(self.gap),
            self.lp_seconds,
            self.mip_seconds,
            self.status)
    }
}

pub struct ResultTable<W:Write> {
    writer:W,
    header_written:bool,
}

impl ResultTable<File> {
    // appends to path, the header only goes into an empty file
    pub fn open(path:impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let header_written = file.metadata()?.len() > 0;
        Ok(Self {writer:file,header_written})
    }
}

impl<W:Write> ResultTable<W> {
    pub fn new(writer:W) -> Self {
        Self {writer,header_written:false}
    }
    pub fn append(&mut self,row:&ResultRow) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.writer,"{HEADER}")?;
            self.header_written = true;
        }
        writeln!(self.writer,"{}",row.to_csv())?;
        self.writer.flush()
    }
    pub fn into_inner(self) -> W {
        self.writer
    }
}
