//! Command Table

/// Controller opcodes. Values are protocol-fixed.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Set the number of gate lines
    ///
    /// <<A:u8, 0:b7, A8:b1, 0:b5, B:b3>>
    DriverOutputControl = 0x01,
    /// Deep Sleep mode Control
    ///
    /// <<0:b7, A:b1>>
    ///
    /// ## A
    /// A=0, Normal Mode [POR]
    /// A=1, Enter Deep Sleep Mode
    DeepSleepMode = 0x10,
    /// Define data entry sequence
    /// <<0:b5, A:b3>>
    ///
    /// ## A[1:0]
    /// - 00 – Y decrement, X decrement,
    /// - 01 – Y decrement, X increment,
    /// - 10 – Y increment, X decrement,
    /// - 11 – Y increment, X increment [POR]
    ///
    /// ## A[2]
    /// - AM = 0, the address counter is updated in the X direction. [POR]
    /// - AM = 1, the address counter is updated in the Y direction.
    DataEntryModeSetting = 0x11,
    SwReset = 0x12,
    /// Activate Display Update Sequence
    ///
    /// The Display Update Sequence Option is located at R22h
    MasterActivation = 0x20,
    DisplayUpdateControl1 = 0x21,
    /// Display Update Sequence Option:
    /// Enable the stage for Master Activation.
    ///
    /// 0xF7 runs the full-refresh sequence, 0x0F the partial one, 0xC0
    /// powers the analog stage to take a freshly written LUT.
    DisplayUpdateControl2 = 0x22,
    /// Write RAM, bank A. The "new" frame.
    WriteRam = 0x24,
    /// Write RAM, bank B. Holds the baseline ("old") frame that partial
    /// refresh diffs against.
    WriteRamBase = 0x26,
    /// Write LUT register from MCU interface [153 bytes]
    WriteLutRegister = 0x32,
    /// Write register for display option (gate/border timing)
    DisplayOptionControl = 0x37,
    BorderWaveformControl = 0x3c,
    /// Specify the start/end positions of the window address in the X direction by an address unit.
    ///
    /// x point must be the multiple of 8 or the last 3 bits will be ignored
    SetRamXAddressStartEndPosition = 0x44,
    /// Specify the start/end positions of the window address in the Y direction by an address unit.
    SetRamYAddressStartEndPosition = 0x45,
    SetRamXAddressCounter = 0x4e,
    SetRamYAddressCounter = 0x4f,
}
