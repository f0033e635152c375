// packed bit vector, used as the per-column integrality mask of a model

#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub(crate) struct BitSet {
    size:usize,
    bytes:Vec<u8>
}

impl BitSet {
    pub(crate) fn new() -> Self {
        Self {size:0,bytes:vec![]}
    }
    pub(crate) fn with_capacity(capacity:usize) -> Self {
        if capacity == 0 {return Self::new()}
        let vec_capacity = capacity/8 + 1;
        Self {
            size:0,
            bytes:Vec::with_capacity(vec_capacity)
        }
    }
    pub(crate) fn len(&self) -> usize {
        self.size
    }
    pub(crate) fn push_bit(&mut self, bit:bool) {
        let byte_pos = self.size / 8;
        let pos_in_byte = self.size % 8;

        debug_assert!(byte_pos <= self.bytes.len());

        if let Some(byte) = self.bytes.get_mut(byte_pos) {
            let mask = 1u8 << pos_in_byte;
            if bit {
                *byte |= mask;
            }else{
                *byte &= !mask;
            }
        }else{
            // a fresh byte always starts at bit 0
            self.bytes.push(if bit {1} else {0})
        }
        self.size += 1;
    }
    pub(crate) fn get_at(&self,index:usize) -> Option<bool> {
        if index >= self.size {return None}
        let byte_pos = index / 8;
        let pos_in_byte = index % 8;
        let byte = self.bytes.get(byte_pos)?;
        let mask = 1u8 << pos_in_byte;
        Some(*byte & mask > 0)
    }
    pub(crate) fn count_ones(&self) -> usize {
        (0..self.size).filter(|i| self.get_at(*i) == Some(true)).count()
    }
    pub(crate) fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(|i| self.get_at(*i) == Some(true))
    }
}

impl FromIterator<bool> for BitSet {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut set = Self::with_capacity(iter.size_hint().0);
        for bit in iter {
            set.push_bit(bit);
        }
        set
    }
}

#[cfg(test)]
mod tests{
    use super::BitSet;
    #[test]
    fn test_create() {
        BitSet::new();
        let mut set = BitSet::with_capacity(114514);
        for _ in 0..114514 {set.push_bit(true);}
        assert!(set.get_at(10000).unwrap());
        assert!(set.get_at(114513).unwrap());
        set.push_bit(false);
        assert_eq!(set.get_at(114514),Some(false));
        assert_eq!(set.get_at(114515),None);
        assert_eq!(set.count_ones(),114514);
    }
    #[test]
    fn test_fresh_byte_keeps_only_its_bit() {
        let set:BitSet = [false,false,false,false,false,false,false,false,true].into_iter().collect();
        assert_eq!(set.len(),9);
        assert_eq!(set.iter_ones().collect::<Vec<_>>(),vec![8]);
        let set:BitSet = [true].into_iter().collect();
        assert_eq!(set.count_ones(),1);
    }
}
