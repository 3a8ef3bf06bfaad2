//! Parsed sections
//!
//! Every parse function produces one variant of the closed [`Section`]
//! type. Checks receive their declared sections as a [`SectionSet`] and
//! extract the typed payload with [`SectionSet::typed`].

use crate::error::CheckError;
use crate::plugins::{
    cpu_loads::CpuLoadSection, diskstat::DiskstatSection, interfaces::InterfaceSection,
    jolokia_info::JolokiaInfoSection, juniper_cpu_util::JuniperCpuSection,
    kernel::KernelSection, mem::MemSection,
};

/// Typed result of a parse function
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Kernel(KernelSection),
    CpuLoad(CpuLoadSection),
    JuniperCpu(JuniperCpuSection),
    Diskstat(DiskstatSection),
    Interfaces(InterfaceSection),
    Mem(MemSection),
    JolokiaInfo(JolokiaInfoSection),
}

/// Payload types that can be borrowed out of a [`Section`]
pub trait FromSection {
    fn from_section(section: &Section) -> Option<&Self>;
}

impl FromSection for KernelSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::Kernel(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromSection for CpuLoadSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::CpuLoad(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromSection for JuniperCpuSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::JuniperCpu(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromSection for DiskstatSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::Diskstat(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromSection for InterfaceSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::Interfaces(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromSection for MemSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::Mem(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromSection for JolokiaInfoSection {
    fn from_section(section: &Section) -> Option<&Self> {
        match section {
            Section::JolokiaInfo(inner) => Some(inner),
            _ => None,
        }
    }
}

/// The sections a check declared, in declaration order, each possibly absent
#[derive(Debug, Clone)]
pub struct SectionSet<'a> {
    names: &'static [&'static str],
    sections: Vec<Option<&'a Section>>,
}

impl<'a> SectionSet<'a> {
    pub fn new(names: &'static [&'static str], sections: Vec<Option<&'a Section>>) -> Self {
        debug_assert_eq!(names.len(), sections.len());
        Self { names, sections }
    }

    /// Convenience constructor for a single-section check
    pub fn single(name: &'static [&'static str], section: &'a Section) -> Self {
        Self::new(name, vec![Some(section)])
    }

    pub fn get(&self, index: usize) -> Option<&'a Section> {
        self.sections.get(index).copied().flatten()
    }

    /// Borrow the typed payload of the section at `index`
    ///
    /// An absent section is `Ok(None)`; a section of the wrong variant is a
    /// programming error.
    pub fn typed<T: FromSection>(&self, index: usize) -> Result<Option<&'a T>, CheckError> {
        match self.get(index) {
            None => Ok(None),
            Some(section) => T::from_section(section).map(Some).ok_or_else(|| {
                CheckError::SectionMismatch {
                    section: self.names.get(index).copied().unwrap_or("?").to_string(),
                }
            }),
        }
    }

    /// True when every declared section is absent
    pub fn all_absent(&self) -> bool {
        self.sections.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::mem::MemSection;

    #[test]
    fn test_typed_access() {
        let section = Section::Mem(MemSection::default());
        let set = SectionSet::single(&["mem"], &section);
        assert!(set.typed::<MemSection>(0).unwrap().is_some());
        assert!(matches!(
            set.typed::<KernelSection>(0),
            Err(CheckError::SectionMismatch { .. })
        ));
    }

    #[test]
    fn test_absent_sections() {
        let set = SectionSet::new(&["kernel", "cpu"], vec![None, None]);
        assert!(set.all_absent());
        assert!(set.typed::<KernelSection>(0).unwrap().is_none());
        assert!(set.typed::<CpuLoadSection>(5).unwrap().is_none());
    }
}
