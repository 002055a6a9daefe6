use cubium_core::{
    machine::Machine,
    memory::{AddressSpace, MemoryAccess},
};
use tracing::debug;

use super::value::SearchScalar;
use crate::error::SearchErrorCode;

/// One contiguous window of the address space to sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    pub start: u32,
    pub length: u64,
}

impl MemoryRange {
    pub fn new(start: u32, length: u64) -> Self {
        Self { start, length }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareType {
    #[default]
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareType {
    /// Evaluates `lhs <op> rhs`.
    pub fn matches<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CompareType::Equal => lhs == rhs,
            CompareType::NotEqual => lhs != rhs,
            CompareType::Less => lhs < rhs,
            CompareType::LessOrEqual => lhs <= rhs,
            CompareType::Greater => lhs > rhs,
            CompareType::GreaterOrEqual => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    CompareAgainstSpecificValue,
    CompareAgainstLastValue,
    #[default]
    DoNotFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchResultValueState {
    ValueFromPhysicalMemory,
    ValueFromVirtualMemory,
    AddressNotAccessible,
}

impl SearchResultValueState {
    fn from_translated(translated: bool) -> Self {
        if translated {
            SearchResultValueState::ValueFromVirtualMemory
        } else {
            SearchResultValueState::ValueFromPhysicalMemory
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult<T> {
    pub address: u32,
    /// Stale when `value_state` is `AddressNotAccessible`; never compared then.
    pub value: T,
    pub value_state: SearchResultValueState,
}

impl<T> SearchResult<T> {
    pub fn is_value_valid(&self) -> bool {
        self.value_state != SearchResultValueState::AddressNotAccessible
    }
}

fn check_preconditions(
    machine: &dyn Machine,
    mem: &dyn MemoryAccess,
    address_space: AddressSpace,
) -> Result<(), SearchErrorCode> {
    if !machine.state().is_emulation_active() {
        return Err(SearchErrorCode::NoEmulationActive);
    }
    if address_space == AddressSpace::Virtual && !mem.translation_enabled() {
        return Err(SearchErrorCode::VirtualAddressesCurrentlyNotAccessible);
    }
    Ok(())
}

/// Full sweep over `memory_ranges`, keeping every readable address whose
/// value passes `validator`.
pub fn new_search<T: SearchScalar>(
    machine: &dyn Machine,
    memory_ranges: &[MemoryRange],
    address_space: AddressSpace,
    aligned: bool,
    validator: impl Fn(T) -> bool,
) -> Result<Vec<SearchResult<T>>, SearchErrorCode> {
    let data_size = size_of::<T>() as u64;
    let mut outcome = Err(SearchErrorCode::NoEmulationActive);

    machine.run_as_cpu_thread(&mut |mem| {
        if let Err(err) = check_preconditions(machine, mem, address_space) {
            outcome = Err(err);
            return;
        }

        let mut results = Vec::new();
        for range in memory_ranges {
            let step = if aligned { data_size } else { 1 };
            let range_start = u64::from(range.start);
            let range_end = range_start.saturating_add(range.length);
            let mut addr = if aligned {
                range_start.next_multiple_of(data_size)
            } else {
                range_start
            };

            // Candidates never read past the end of the range.
            while addr + data_size <= range_end {
                let Ok(addr32) = u32::try_from(addr) else {
                    break;
                };
                if let Some(current) = T::try_read(mem, addr32, address_space) {
                    if validator(current.value) {
                        results.push(SearchResult {
                            address: addr32,
                            value: current.value,
                            value_state: SearchResultValueState::from_translated(
                                current.translated,
                            ),
                        });
                    }
                }
                addr += step;
            }
        }
        outcome = Ok(results);
    });

    outcome
}

/// Re-reads every previously found address and keeps those that pass
/// `validator(new, old)`.
///
/// An address that can no longer be read is kept as `AddressNotAccessible`
/// only when `keep_inaccessible` is set or its previous value was already
/// invalid. An address whose previous value was invalid is refreshed
/// unconditionally so it cannot get stuck.
pub fn next_search<T: SearchScalar>(
    machine: &dyn Machine,
    previous_results: &[SearchResult<T>],
    address_space: AddressSpace,
    keep_inaccessible: bool,
    validator: impl Fn(T, T) -> bool,
) -> Result<Vec<SearchResult<T>>, SearchErrorCode> {
    let mut outcome = Err(SearchErrorCode::NoEmulationActive);

    machine.run_as_cpu_thread(&mut |mem| {
        if let Err(err) = check_preconditions(machine, mem, address_space) {
            outcome = Err(err);
            return;
        }

        let mut results = Vec::with_capacity(previous_results.len());
        for previous in previous_results {
            match T::try_read(mem, previous.address, address_space) {
                None => {
                    if keep_inaccessible || !previous.is_value_valid() {
                        results.push(SearchResult {
                            address: previous.address,
                            value: previous.value,
                            value_state: SearchResultValueState::AddressNotAccessible,
                        });
                    }
                }
                Some(current) => {
                    if !previous.is_value_valid() || validator(current.value, previous.value) {
                        results.push(SearchResult {
                            address: previous.address,
                            value: current.value,
                            value_state: SearchResultValueState::from_translated(
                                current.translated,
                            ),
                        });
                    }
                }
            }
        }
        outcome = Ok(results);
    });

    outcome
}

/// One search over a fixed set of ranges, narrowed round by round.
#[derive(Debug, Clone)]
pub struct CheatSearchSession<T: SearchScalar> {
    memory_ranges: Vec<MemoryRange>,
    address_space: AddressSpace,
    aligned: bool,
    compare_type: CompareType,
    filter_type: FilterType,
    value: Option<T>,
    first_search_done: bool,
    search_results: Vec<SearchResult<T>>,
}

impl<T: SearchScalar> CheatSearchSession<T> {
    pub fn new(memory_ranges: Vec<MemoryRange>, address_space: AddressSpace, aligned: bool) -> Self {
        Self {
            memory_ranges,
            address_space,
            aligned,
            compare_type: CompareType::default(),
            filter_type: FilterType::default(),
            value: None,
            first_search_done: false,
            search_results: Vec::new(),
        }
    }

    pub fn set_compare_type(&mut self, compare_type: CompareType) {
        self.compare_type = compare_type;
    }

    pub fn compare_type(&self) -> CompareType {
        self.compare_type
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_value(&mut self, value: Option<T>) {
        self.value = value;
    }

    pub fn value(&self) -> Option<T> {
        self.value
    }

    /// Parses and stores the comparison literal. On failure the literal is
    /// cleared and `false` is returned.
    pub fn set_value_from_string(&mut self, value_as_string: &str) -> bool {
        self.value = T::parse_literal(value_as_string);
        self.value.is_some()
    }

    pub fn reset_results(&mut self) {
        self.first_search_done = false;
        self.search_results.clear();
    }

    /// Runs one round. On error the session is left unchanged.
    pub fn run_search(&mut self, machine: &dyn Machine) -> Result<(), SearchErrorCode> {
        let compare_type = self.compare_type;
        let results = match self.filter_type {
            FilterType::CompareAgainstSpecificValue => {
                let Some(literal) = self.value else {
                    return Err(SearchErrorCode::InvalidParameters);
                };
                if self.first_search_done {
                    next_search(
                        machine,
                        &self.search_results,
                        self.address_space,
                        false,
                        |new, _old| compare_type.matches(new, literal),
                    )
                } else {
                    new_search(
                        machine,
                        &self.memory_ranges,
                        self.address_space,
                        self.aligned,
                        |new| compare_type.matches(new, literal),
                    )
                }
            }
            FilterType::CompareAgainstLastValue => {
                if !self.first_search_done {
                    return Err(SearchErrorCode::InvalidParameters);
                }
                next_search(
                    machine,
                    &self.search_results,
                    self.address_space,
                    false,
                    |new, old| compare_type.matches(new, old),
                )
            }
            FilterType::DoNotFilter => {
                if self.first_search_done {
                    next_search(
                        machine,
                        &self.search_results,
                        self.address_space,
                        true,
                        |_, _| true,
                    )
                } else {
                    new_search(
                        machine,
                        &self.memory_ranges,
                        self.address_space,
                        self.aligned,
                        |_| true,
                    )
                }
            }
        }?;

        debug!(
            "{} search round kept {} of {} results",
            T::DATA_TYPE,
            results.len(),
            self.search_results.len()
        );
        self.search_results = results;
        self.first_search_done = true;
        Ok(())
    }

    pub fn memory_ranges(&self) -> &[MemoryRange] {
        &self.memory_ranges
    }

    pub fn address_space(&self) -> AddressSpace {
        self.address_space
    }

    pub fn aligned(&self) -> bool {
        self.aligned
    }

    pub fn results(&self) -> &[SearchResult<T>] {
        &self.search_results
    }

    /// `None` past the end and for results whose address became unreadable.
    pub fn result_value(&self, index: usize) -> Option<T> {
        self.search_results
            .get(index)
            .filter(|r| r.is_value_valid())
            .map(|r| r.value)
    }

    pub fn was_first_search_done(&self) -> bool {
        self.first_search_done
    }

    /// New session over the same configuration holding only the results at
    /// `result_indices`, in the order given. Out-of-range indices are skipped.
    pub fn clone_partial(&self, result_indices: &[usize]) -> Self {
        let search_results = result_indices
            .iter()
            .filter_map(|&idx| self.search_results.get(idx).copied())
            .collect();
        Self {
            memory_ranges: self.memory_ranges.clone(),
            address_space: self.address_space,
            aligned: self.aligned,
            compare_type: self.compare_type,
            filter_type: self.filter_type,
            value: self.value,
            first_search_done: self.first_search_done,
            search_results,
        }
    }
}
