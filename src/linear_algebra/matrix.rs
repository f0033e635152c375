use thiserror::Error;

#[derive(Error,Debug,Clone,PartialEq)]
pub enum MatrixError {
    #[error("Matrix size is:{matrix_size:?},but index at {accessed_index:?} was accessed")]
    IndexOutOfBounds{matrix_size:(usize,usize),accessed_index:(usize,usize)},
    #[error("Matrix have {row_count} rows ,but row at {accessed_row} was accessed")]
    RowOutOfBounds{row_count:usize,accessed_row:usize},
    #[error("Matrix have {col_count} cols ,but col at {accessed_col} was accessed")]
    ColOutOfBounds{col_count:usize,accessed_col:usize},
    #[error("pivot at ({row},{col}) is {value}, too close to zero")]
    SingularPivot{row:usize,col:usize,value:f64},
}

pub(crate) type Result<T> = std::result::Result<T,MatrixError>;

// A double precision matrix, row major order
// which means rows are stored continuously
#[derive(Clone,Debug,PartialEq)]
pub struct Matrix {
    row_count:usize,
    col_count:usize,
    //row*col must equal elements.len()
    // otherwise invariants are broken, panics allowed
    elements:Vec<f64>
}

impl Default for Matrix {
    fn default() -> Self {
        Self {
            row_count:0,
            col_count:0,
            elements:vec![]
        }
    }
}

//public implementations
impl Matrix {
    pub fn zeros(row:usize,col:usize) -> Self {
        if row*col == 0 {
            return Self::default()
        }
        Self {
            row_count:row,
            col_count:col,
            elements:vec![0.0;row*col]
        }
    }
    unsafe fn get_unchecked(&self,row:usize,col:usize) -> f64 {
        unsafe {*self.elements.get_unchecked(row*self.col_count + col)}
    }
    pub fn get(&self,row:usize,col:usize) -> Result<f64> {
        debug_assert_eq!(self.row_count*self.col_count,self.elements.len());
        let out_of_bounds = MatrixError::IndexOutOfBounds { matrix_size:
            (self.row_count,self.col_count),
            accessed_index: (row,col)
        };
        if row >= self.row_count || col >= self.col_count {
            return Err(out_of_bounds)
        }
        self.elements.get(row*self.col_count + col).map(|n| *n).ok_or(out_of_bounds)
    }
    pub fn get_mut(&mut self,row:usize,col:usize) -> Result<&mut f64> {
        debug_assert_eq!(self.row_count*self.col_count,self.elements.len());
        let out_of_bounds = MatrixError::IndexOutOfBounds { matrix_size:
            (self.row_count,self.col_count),
            accessed_index: (row,col)
        };
        if row >= self.row_count || col >= self.col_count {
            return Err(out_of_bounds)
        }
        self.elements.get_mut(row*self.col_count + col).ok_or(out_of_bounds)
    }
    pub fn set(&mut self,row:usize,col:usize,value:f64) -> Result<()> {
        *self.get_mut(row, col)? = value;
        Ok(())
    }
    pub fn row(&self,row:usize) -> Result<&[f64]> {
        if row >= self.row_count {
            return Err(MatrixError::RowOutOfBounds { row_count: self.row_count, accessed_row: row })
        }
        let start = row*self.col_count;
        Ok(&self.elements[start..start+self.col_count])
    }

    // dest_row -= coefficient*src_row, columns before offset are untouched
    pub fn row_elimination(&mut self, src_row:usize,dest_row:usize,offset:usize, coefficient:f64) -> Result<()>{
        debug_assert_eq!(self.row_count*self.col_count,self.elements.len());
        let row_ofb = | row | MatrixError::RowOutOfBounds { row_count: self.row_count, accessed_row: row };
        if src_row >= self.row_count {
            return Err(row_ofb(src_row))
        }
        if dest_row >= self.row_count {
            return Err(row_ofb(dest_row))
        }

        if offset >= self.col_count {
            return Err(MatrixError::ColOutOfBounds { col_count: self.col_count, accessed_col: offset })
        }

        let elimination_len = self.col_count - offset;

        let src_start = self.col_count*src_row + offset;
        let src_end = elimination_len + src_start;

        if src_row == dest_row {
            for i in &mut self.elements[src_start..src_end] {
                (*i)*=1.0-coefficient;
            }
            return Ok(())
        }

        let dest_start = self.col_count*dest_row + offset;
        let dest_end = elimination_len + dest_start;

        debug_assert!(src_end <= self.elements.len());
        debug_assert!(dest_end <= self.elements.len());

        // no overlapping
        debug_assert!(dest_end <= src_start || src_end <= dest_start);

        // we have to read & write to different parts of the same &mut matrix
        // so we can't uphold the borrowing rule. go unsafe here
        let (src_row,dest_row) = unsafe {
            let src_row =  self.elements.as_ptr().add(src_start);
            let src_row = std::slice::from_raw_parts(src_row, elimination_len);
            let dest_row = self.elements.as_mut_ptr().add(dest_start);
            let dest_row = std::slice::from_raw_parts_mut(dest_row, elimination_len);
            (src_row,dest_row)
        };

        for (src_i,dest_i) in src_row.iter().zip(dest_row.iter_mut()) {
            *dest_i -= coefficient*src_i;
        }

        Ok(())
    }

    pub fn scale_row(&mut self,row:usize,factor:f64) -> Result<()> {
        if row >= self.row_count {
            return Err(MatrixError::RowOutOfBounds { row_count: self.row_count, accessed_row: row })
        }
        let start = row*self.col_count;
        for i in &mut self.elements[start..start+self.col_count] {
            *i *= factor;
        }
        Ok(())
    }

    // Gauss-Jordan step: (row,col) becomes 1, the rest of col becomes 0
    pub fn pivot(&mut self,row:usize,col:usize) -> Result<()> {
        const EPS:f64 = 1e-12;
        let value = self.get(row, col)?;
        if value.abs() < EPS {
            return Err(MatrixError::SingularPivot { row, col, value })
        }
        self.scale_row(row, 1.0/value)?;
        for dest_row in 0..self.row_count {
            if dest_row == row {continue}
            // safety: row and col were bounds checked by get above
            let coef = unsafe {self.get_unchecked(dest_row, col)};
            if coef == 0.0 {continue}
            self.row_elimination(row, dest_row, 0, coef)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.col_count == 0 || self.row_count == 0 || self.elements.is_empty()
    }

    pub fn dimension(&self) -> (usize,usize) {
        if self.is_empty() {return (0,0)}
        (self.row_count,self.col_count)
    }
}
