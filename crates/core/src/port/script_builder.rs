// Reduction Script Builder Port

use crate::domain::ReductionParameters;

/// Pure mapping from a parameter set to a job script
pub trait ScriptBuilder: Send + Sync {
    /// Render the script; results are written to `output_dir`
    fn build(&self, parameters: &ReductionParameters, output_dir: &str) -> String;

    /// File name of the script; `Some(i)` names the i-th script of a job set
    fn script_name(&self, index: Option<usize>) -> String;
}
