//! USART register image.
//!
//! Bit positions follow the classic AVR USART layout (UCSRnA/B/C + UBRRn).

/// Control and status register A.
pub mod ucsra {
    /// Receive complete: unread data in the receive register.
    pub const RXC: u8 = 1 << 7;
    /// Transmit complete.
    pub const TXC: u8 = 1 << 6;
    /// Data register empty: the transmitter can take a byte.
    pub const UDRE: u8 = 1 << 5;
    /// Frame error.
    pub const FE: u8 = 1 << 4;
    /// Data overrun: a byte arrived while the receive register was full.
    pub const DOR: u8 = 1 << 3;
    /// Parity error.
    pub const UPE: u8 = 1 << 2;
    /// Double transmission speed.
    pub const U2X: u8 = 1 << 1;
}

/// Control and status register B.
pub mod ucsrb {
    /// Receive complete interrupt enable.
    pub const RXCIE: u8 = 1 << 7;
    /// Transmit complete interrupt enable.
    pub const TXCIE: u8 = 1 << 6;
    /// Data register empty interrupt enable.
    pub const UDRIE: u8 = 1 << 5;
    /// Receiver enable.
    pub const RXEN: u8 = 1 << 4;
    /// Transmitter enable.
    pub const TXEN: u8 = 1 << 3;
}

/// Control and status register C (asynchronous mode).
pub mod ucsrc {
    /// Parity mode bit 1.
    pub const UPM1: u8 = 1 << 5;
    /// Parity mode bit 0.
    pub const UPM0: u8 = 1 << 4;
    /// Stop bit select (set: 2 stop bits).
    pub const USBS: u8 = 1 << 3;
    /// Character size bit 1.
    pub const UCSZ1: u8 = 1 << 2;
    /// Character size bit 0.
    pub const UCSZ0: u8 = 1 << 1;
}

/// Transmitter/receiver enable bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Enable {
    pub tx: bool,
    pub rx: bool,
    pub rx_interrupt: bool,
}

impl Enable {
    /// Everything off.
    pub const NONE: Enable = Enable {
        tx: false,
        rx: false,
        rx_interrupt: false,
    };

    /// Transmitter and receiver, no receive interrupt (polled receive).
    pub const POLLED: Enable = Enable {
        tx: true,
        rx: true,
        rx_interrupt: false,
    };

    /// Transmitter, receiver and receive-complete interrupt.
    pub const BUFFERED: Enable = Enable {
        tx: true,
        rx: true,
        rx_interrupt: true,
    };

    /// Encode into a UCSRB register image.
    pub fn ucsrb(&self) -> u8 {
        let mut value = 0;
        if self.tx {
            value |= ucsrb::TXEN;
        }
        if self.rx {
            value |= ucsrb::RXEN;
        }
        if self.rx_interrupt {
            value |= ucsrb::RXCIE;
        }
        value
    }

    /// Decode from a UCSRB register image.
    pub fn from_ucsrb(value: u8) -> Self {
        Self {
            tx: value & ucsrb::TXEN != 0,
            rx: value & ucsrb::RXEN != 0,
            rx_interrupt: value & ucsrb::RXCIE != 0,
        }
    }

    /// Whether received bytes are routed to the receive handler.
    pub fn interrupt_driven(&self) -> bool {
        self.rx && self.rx_interrupt
    }
}

/// Snapshot of a port's registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub ucsra: u8,
    pub ucsrb: u8,
    pub ucsrc: u8,
    pub ubrr: u16,
}

impl Registers {
    /// Enable bits currently programmed.
    pub fn enable(&self) -> Enable {
        Enable::from_ucsrb(self.ucsrb)
    }

    /// Whether the receive register holds unread data.
    pub fn rx_complete(&self) -> bool {
        self.ucsra & ucsra::RXC != 0
    }

    /// Whether a byte was lost to an overrun since the last read.
    pub fn overrun(&self) -> bool {
        self.ucsra & ucsra::DOR != 0
    }

    /// Whether the double-speed prescaler is selected.
    pub fn double_speed(&self) -> bool {
        self.ucsra & ucsra::U2X != 0
    }
}
