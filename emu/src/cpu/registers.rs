pub const REG_SP: u32 = 13;
pub const REG_LR: u32 = 14;
pub const REG_PROGRAM_COUNTER: u32 = 15;

/// The 16 general purpose registers. R13 holds the stack pointer, R14 the
/// link register and R15 the program counter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers([u32; 16]);

impl Registers {
    pub fn program_counter(&self) -> u32 {
        self.0[REG_PROGRAM_COUNTER as usize]
    }

    pub fn set_program_counter(&mut self, new_value: u32) {
        self.0[REG_PROGRAM_COUNTER as usize] = new_value;
    }

    pub fn stack_pointer(&self) -> u32 {
        self.0[REG_SP as usize]
    }

    pub fn set_stack_pointer(&mut self, new_value: u32) {
        self.0[REG_SP as usize] = new_value;
    }

    pub fn link_register(&self) -> u32 {
        self.0[REG_LR as usize]
    }

    pub fn set_link_register(&mut self, new_value: u32) {
        self.0[REG_LR as usize] = new_value;
    }

    pub fn register_at(&self, reg: u32) -> u32 {
        self.0[reg as usize]
    }

    pub fn set_register_at(&mut self, reg: u32, new_value: u32) {
        self.0[reg as usize] = new_value;
    }
}
