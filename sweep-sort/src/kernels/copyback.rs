use sweep_primitives::{Kernel, KernelFault, LocalMemory, WorkGroup};

use crate::range::ElementView;

/// Element-wise copy `src[i] -> dst[i]` for `i < n`, one element per item.
pub(crate) struct CopyKernel {
    pub src: ElementView,
    pub dst: ElementView,
    pub n: usize,
}

impl Kernel for CopyKernel {
    fn name(&self) -> &'static str {
        "copyback"
    }

    fn run(&self, group: &WorkGroup<'_>, _local: &mut LocalMemory) -> Result<(), KernelFault> {
        let size = group.size() as usize;
        let base = group.id() * size;
        for i in base..(base + size).min(self.n) {
            self.dst.store_words(i, self.src.load_words(i));
        }
        Ok(())
    }
}
