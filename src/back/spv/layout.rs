use super::{Instruction, LogicalLayout, PhysicalLayout};
use spirv::{Op, Word, MAGIC_NUMBER};

// The generator magic number; zero is reserved for tools without a
// registered ID.
const GENERATOR: Word = 0;

impl PhysicalLayout {
    pub(super) fn new(version: (u8, u8)) -> Self {
        let (major, minor) = version;
        let version = ((major as u32) << 16) | ((minor as u32) << 8);
        PhysicalLayout {
            magic_number: MAGIC_NUMBER,
            version,
            generator: GENERATOR,
            bound: 0,
            instruction_schema: 0,
        }
    }

    pub(super) fn in_words(&self, sink: &mut Vec<Word>) {
        sink.push(self.magic_number);
        sink.push(self.version);
        sink.push(self.generator);
        sink.push(self.bound);
        sink.push(self.instruction_schema);
    }
}

impl LogicalLayout {
    pub(super) fn in_words(&self, sink: &mut Vec<Word>) {
        sink.extend(self.capabilities.iter());
        sink.extend(self.extensions.iter());
        sink.extend(self.ext_inst_imports.iter());
        sink.extend(self.memory_model.iter());
        sink.extend(self.entry_points.iter());
        sink.extend(self.execution_modes.iter());
        sink.extend(self.debugs.iter());
        sink.extend(self.annotations.iter());
        sink.extend(self.declarations.iter());
        sink.extend(self.function_definitions.iter());
    }
}

impl Instruction {
    pub(super) fn new(op: Op) -> Self {
        Instruction {
            op,
            wc: 1, // Always start at 1 for the first word (opcode + word count)
            type_id: None,
            result_id: None,
            operands: vec![],
        }
    }

    pub(super) fn set_type(&mut self, id: Word) {
        assert!(self.type_id.is_none(), "Type can only be set once");
        self.type_id = Some(id);
        self.wc += 1;
    }

    pub(super) fn set_result(&mut self, id: Word) {
        assert!(self.result_id.is_none(), "Result can only be set once");
        self.result_id = Some(id);
        self.wc += 1;
    }

    pub(super) fn add_operand(&mut self, operand: Word) {
        self.operands.push(operand);
        self.wc += 1;
    }

    pub(super) fn add_operands(&mut self, operands: Vec<Word>) {
        for operand in operands.into_iter() {
            self.add_operand(operand)
        }
    }

    pub(super) fn to_words(&self, sink: &mut Vec<Word>) {
        sink.push(self.wc << 16 | self.op as u32);
        if let Some(id) = self.type_id {
            sink.push(id);
        }
        if let Some(id) = self.result_id {
            sink.push(id);
        }
        sink.extend_from_slice(&self.operands);
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Instruction, LogicalLayout, PhysicalLayout};
    use spirv::{Op, MAGIC_NUMBER};

    #[test]
    fn physical_layout_in_words() {
        let layout = PhysicalLayout::new((1, 3));
        let mut words = Vec::new();
        layout.in_words(&mut words);
        assert_eq!(words[0], MAGIC_NUMBER);
        assert_eq!(words[1], (1 << 16) | (3 << 8));
        assert_eq!(words[4], 0);
    }

    #[test]
    fn instruction_word_count() {
        let mut instruction = Instruction::new(Op::TypeInt);
        instruction.set_result(1);
        instruction.add_operand(32);
        instruction.add_operand(1);
        let mut words = Vec::new();
        instruction.to_words(&mut words);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0] >> 16, 4);
        assert_eq!(words[0] & 0xffff, Op::TypeInt as u32);
    }

    #[test]
    fn logical_layout_section_order() {
        let mut layout = LogicalLayout::default();
        layout.capabilities.push(1);
        layout.memory_model.push(2);
        layout.declarations.push(3);
        layout.function_definitions.push(4);
        let mut words = Vec::new();
        layout.in_words(&mut words);
        assert_eq!(words, vec![1, 2, 3, 4]);
    }
}
