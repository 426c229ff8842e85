//! Message RAM layout bookkeeping
//!
//! The controller addresses its element storage through start addresses and
//! element size codes programmed during configuration. [`MessageRamRegion`]
//! records one such area on the driver side so element slots can be located
//! without re-deriving the layout from registers.

/// Data field sizes supported by the Rx/Tx element size registers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementSize {
    /// 8 data bytes
    Bytes8 = 0,
    /// 12 data bytes
    Bytes12 = 1,
    /// 16 data bytes
    Bytes16 = 2,
    /// 20 data bytes
    Bytes20 = 3,
    /// 24 data bytes
    Bytes24 = 4,
    /// 32 data bytes
    Bytes32 = 5,
    /// 48 data bytes
    Bytes48 = 6,
    /// 64 data bytes
    Bytes64 = 7,
}

/// Bytes occupied by the two header words of a Tx/Rx element
pub(crate) const ELEMENT_HEADER_BYTES: u8 = 8;
/// Total size of one Tx event FIFO element
pub(crate) const TX_EVENT_ELEMENT_BYTES: u8 = 8;
/// Total size of one standard ID filter element
pub(crate) const STANDARD_FILTER_BYTES: u8 = 4;
/// Total size of one extended ID filter element
pub(crate) const EXTENDED_FILTER_BYTES: u8 = 8;

impl ElementSize {
    /// Number of data bytes this size provides
    pub fn data_size(self) -> u8 {
        match self {
            Self::Bytes8 => 8,
            Self::Bytes12 => 12,
            Self::Bytes16 => 16,
            Self::Bytes20 => 20,
            Self::Bytes24 => 24,
            Self::Bytes32 => 32,
            Self::Bytes48 => 48,
            Self::Bytes64 => 64,
        }
    }

    /// Looks up the size providing exactly `data_size` data bytes.
    pub fn from_data_size(data_size: u8) -> Option<Self> {
        Some(match data_size {
            8 => Self::Bytes8,
            12 => Self::Bytes12,
            16 => Self::Bytes16,
            20 => Self::Bytes20,
            24 => Self::Bytes24,
            32 => Self::Bytes32,
            48 => Self::Bytes48,
            64 => Self::Bytes64,
            _ => return None,
        })
    }

    /// 3-bit register code of this size
    pub(crate) fn code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Bytes8,
            1 => Self::Bytes12,
            2 => Self::Bytes16,
            3 => Self::Bytes20,
            4 => Self::Bytes24,
            5 => Self::Bytes32,
            6 => Self::Bytes48,
            7 => Self::Bytes64,
            _ => return None,
        })
    }

    /// Total footprint of one Tx or Rx element, headers included
    pub(crate) fn element_bytes(self) -> u8 {
        self.data_size() + ELEMENT_HEADER_BYTES
    }

    /// Reverses [`Self::element_bytes`].
    pub(crate) fn from_element_bytes(bytes: u8) -> Option<Self> {
        bytes
            .checked_sub(ELEMENT_HEADER_BYTES)
            .and_then(Self::from_data_size)
    }
}

/// One contiguous element area inside the message RAM
///
/// A default-constructed region is "absent": no address, no elements. The
/// configuration sequence replaces it with a populated record whenever the
/// corresponding hardware region is enabled.
#[derive(Copy, Clone)]
pub struct MessageRamRegion {
    address: *mut u32,
    element_bytes: u8,
    count: u8,
}

impl MessageRamRegion {
    pub(crate) const fn empty() -> Self {
        Self {
            address: core::ptr::null_mut(),
            element_bytes: 0,
            count: 0,
        }
    }

    pub(crate) fn new(address: *mut u32, element_bytes: u8, count: u8) -> Self {
        Self {
            address,
            element_bytes,
            count,
        }
    }

    /// Whether the region is currently backed by message RAM
    pub fn is_configured(&self) -> bool {
        !self.address.is_null()
    }

    /// Start address of the region
    pub fn address(&self) -> *mut u32 {
        self.address
    }

    /// Size of one element in bytes
    pub fn element_bytes(&self) -> u8 {
        self.element_bytes
    }

    /// Number of elements the region holds
    pub fn count(&self) -> u8 {
        self.count
    }

    /// First word of the element at `index`
    ///
    /// The caller is responsible for `index` being within the region.
    pub(crate) fn element_ptr(&self, index: u8) -> *mut u32 {
        let words = usize::from(self.element_bytes) / 4 * usize::from(index);
        // In-bounds by the caller contract.
        unsafe { self.address.add(words) }
    }

    pub(crate) fn element_words(&self) -> usize {
        usize::from(self.element_bytes) / 4
    }

    /// First word past the end of the region
    pub(crate) fn end_address(&self) -> *mut u32 {
        self.element_ptr(self.count)
    }
}

impl Default for MessageRamRegion {
    fn default() -> Self {
        Self::empty()
    }
}
