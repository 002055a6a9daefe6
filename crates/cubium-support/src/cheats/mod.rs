//! Memory scanner for building cheat codes.
//!
//! A session sweeps a set of address ranges for values of one scalar kind,
//! then narrows the candidate set round by round. [`CheatSearchSessionBase`]
//! erases the kind so front-ends can hold any session behind one box.

mod session;
mod value;

use std::fmt;

use cubium_core::{machine::Machine, memory::AddressSpace};
use dyn_clone::DynClone;

use crate::error::SearchErrorCode;

pub use session::{
    CheatSearchSession, CompareType, FilterType, MemoryRange, SearchResult,
    SearchResultValueState, new_search, next_search,
};
pub use value::{DataType, SearchScalar, SearchValue, get_data_type, get_value_as_byte_vector};

/// Kind-erased view over a [`CheatSearchSession`].
///
/// Index-taking accessors return `None` for out-of-range indices.
pub trait CheatSearchSessionBase: DynClone + fmt::Debug + Send {
    fn set_compare_type(&mut self, compare_type: CompareType);
    fn set_filter_type(&mut self, filter_type: FilterType);
    fn set_value_from_string(&mut self, value_as_string: &str) -> bool;
    fn reset_results(&mut self);
    fn run_search(&mut self, machine: &dyn Machine) -> Result<(), SearchErrorCode>;

    fn memory_range_count(&self) -> usize;
    fn memory_range(&self, index: usize) -> Option<MemoryRange>;
    fn address_space(&self) -> AddressSpace;
    fn data_type(&self) -> DataType;
    fn aligned(&self) -> bool;

    fn result_count(&self) -> usize;
    fn valid_value_count(&self) -> usize;
    fn result_address(&self, index: usize) -> Option<u32>;
    fn result_value_state(&self, index: usize) -> Option<SearchResultValueState>;
    /// `None` for results whose address could not be read.
    fn result_value_as_search_value(&self, index: usize) -> Option<SearchValue>;
    /// Decimal (or zero-padded hex) text, `"(inaccessible)"` for results
    /// whose address could not be read.
    fn result_value_as_string(&self, index: usize, hex: bool) -> Option<String>;
    fn was_first_search_done(&self) -> bool;

    fn clone_session(&self) -> Box<dyn CheatSearchSessionBase>;

    /// Same configuration and filter state, restricted to `result_indices`.
    fn clone_partial(&self, result_indices: &[usize]) -> Box<dyn CheatSearchSessionBase>;
}

dyn_clone::clone_trait_object!(CheatSearchSessionBase);

impl<T: SearchScalar> CheatSearchSessionBase for CheatSearchSession<T> {
    fn set_compare_type(&mut self, compare_type: CompareType) {
        CheatSearchSession::set_compare_type(self, compare_type);
    }

    fn set_filter_type(&mut self, filter_type: FilterType) {
        CheatSearchSession::set_filter_type(self, filter_type);
    }

    fn set_value_from_string(&mut self, value_as_string: &str) -> bool {
        CheatSearchSession::set_value_from_string(self, value_as_string)
    }

    fn reset_results(&mut self) {
        CheatSearchSession::reset_results(self);
    }

    fn run_search(&mut self, machine: &dyn Machine) -> Result<(), SearchErrorCode> {
        CheatSearchSession::run_search(self, machine)
    }

    fn memory_range_count(&self) -> usize {
        self.memory_ranges().len()
    }

    fn memory_range(&self, index: usize) -> Option<MemoryRange> {
        self.memory_ranges().get(index).copied()
    }

    fn address_space(&self) -> AddressSpace {
        CheatSearchSession::address_space(self)
    }

    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn aligned(&self) -> bool {
        CheatSearchSession::aligned(self)
    }

    fn result_count(&self) -> usize {
        self.results().len()
    }

    fn valid_value_count(&self) -> usize {
        self.results().iter().filter(|r| r.is_value_valid()).count()
    }

    fn result_address(&self, index: usize) -> Option<u32> {
        self.results().get(index).map(|r| r.address)
    }

    fn result_value_state(&self, index: usize) -> Option<SearchResultValueState> {
        self.results().get(index).map(|r| r.value_state)
    }

    fn result_value_as_search_value(&self, index: usize) -> Option<SearchValue> {
        self.result_value(index).map(SearchScalar::into_search_value)
    }

    fn result_value_as_string(&self, index: usize, hex: bool) -> Option<String> {
        let result = self.results().get(index)?;
        Some(if !result.is_value_valid() {
            "(inaccessible)".to_string()
        } else if hex {
            result.value.to_hex_string()
        } else {
            result.value.to_string()
        })
    }

    fn was_first_search_done(&self) -> bool {
        CheatSearchSession::was_first_search_done(self)
    }

    fn clone_session(&self) -> Box<dyn CheatSearchSessionBase> {
        Box::new(self.clone())
    }

    fn clone_partial(&self, result_indices: &[usize]) -> Box<dyn CheatSearchSessionBase> {
        Box::new(CheatSearchSession::clone_partial(self, result_indices))
    }
}

/// Creates an empty session for `data_type`.
pub fn make_session(
    memory_ranges: Vec<MemoryRange>,
    address_space: AddressSpace,
    aligned: bool,
    data_type: DataType,
) -> Box<dyn CheatSearchSessionBase> {
    fn boxed<T: SearchScalar>(
        ranges: Vec<MemoryRange>,
        space: AddressSpace,
        aligned: bool,
    ) -> Box<dyn CheatSearchSessionBase> {
        Box::new(CheatSearchSession::<T>::new(ranges, space, aligned))
    }

    match data_type {
        DataType::U8 => boxed::<u8>(memory_ranges, address_space, aligned),
        DataType::U16 => boxed::<u16>(memory_ranges, address_space, aligned),
        DataType::U32 => boxed::<u32>(memory_ranges, address_space, aligned),
        DataType::U64 => boxed::<u64>(memory_ranges, address_space, aligned),
        DataType::S8 => boxed::<i8>(memory_ranges, address_space, aligned),
        DataType::S16 => boxed::<i16>(memory_ranges, address_space, aligned),
        DataType::S32 => boxed::<i32>(memory_ranges, address_space, aligned),
        DataType::S64 => boxed::<i64>(memory_ranges, address_space, aligned),
        DataType::F32 => boxed::<f32>(memory_ranges, address_space, aligned),
        DataType::F64 => boxed::<f64>(memory_ranges, address_space, aligned),
    }
}
