// EQSANS Mantid reduction script

use crate::domain::ReductionParameters;
use crate::port::ScriptBuilder;

/// Script name used for single submissions
pub const DEFAULT_SCRIPT_NAME: &str = "web_submission.py";

/// Builds the Mantid Python script for an EQSANS reduction
#[derive(Debug, Clone, Default)]
pub struct EqsansScriptBuilder;

fn text<'a>(p: &'a ReductionParameters, name: &str) -> &'a str {
    p.text(name).unwrap_or("")
}

fn number(p: &ReductionParameters, name: &str, default: f64) -> f64 {
    p.number(name).unwrap_or(default)
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Double-quoted Python string literal
fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl ScriptBuilder for EqsansScriptBuilder {
    fn build(&self, p: &ReductionParameters, output_dir: &str) -> String {
        let mut lines: Vec<String> = vec![
            "# EQSANS reduction script".into(),
            "import mantid".into(),
            "from mantid.simpleapi import *".into(),
            "from reduction_workflow.instruments.sans.sns_command_interface import *".into(),
            "config = ConfigService.Instance()".into(),
            "config['instrumentName']='EQSANS'".into(),
        ];

        let mask_file = p.text("mask_file");
        if let Some(mask) = mask_file {
            lines.push(format!("mask_ws = Load(Filename={})", py_str(mask)));
            lines.push(
                "ws, masked_detectors = ExtractMask(InputWorkspace=mask_ws, OutputWorkspace=\"__edited_mask\")".into(),
            );
            lines.push("detector_ids = [int(i) for i in masked_detectors]".into());
        }

        lines.push("EQSANS()".into());
        lines.push("SolidAngle(detector_tubes=True)".into());
        lines.push("TotalChargeNormalization()".into());
        if let Some(scale) = p.number("absolute_scale_factor") {
            lines.push(format!("SetAbsoluteScale({})", scale));
        }

        lines.push("AzimuthalAverage(n_bins=100, n_subpix=1, log_binning=False)".into());
        lines.push("IQxQy(nbins=100)".into());
        lines.push(format!("OutputPath({})", py_str(output_dir)));

        lines.push("UseConfigTOFTailsCutoff(True)".into());
        lines.push("UseConfigMask(True)".into());
        lines.push(format!(
            "Resolution(sample_aperture_diameter={})",
            number(p, "sample_aperture_diameter", 10.0)
        ));
        lines.push("PerformFlightPathCorrection(True)".into());

        if mask_file.is_some() {
            lines.push("MaskDetectors(detector_ids)".into());
        }
        if let Some(dark) = p.text("dark_current_run") {
            lines.push(format!("DarkCurrent({})", py_str(dark)));
        }

        if p.flag("fit_direct_beam") {
            lines.push(format!(
                "DirectBeamCenter({})",
                py_str(text(p, "direct_beam_run"))
            ));
        } else {
            lines.push(format!(
                "SetBeamCenter({}, {})",
                number(p, "beam_center_x", 96.29),
                number(p, "beam_center_y", 126.15)
            ));
        }

        if p.flag("perform_sensitivity") {
            lines.push(format!(
                "SensitivityCorrection({}, min_sensitivity={}, max_sensitivity={}, use_sample_dc=True)",
                py_str(text(p, "sensitivity_file")),
                number(p, "sensitivity_min", 0.5),
                number(p, "sensitivity_max", 1.5)
            ));
        } else {
            lines.push("NoSensitivityCorrection()".into());
        }

        let beam_radius = number(p, "beam_radius", 3.0);
        lines.push(format!(
            "DirectBeamTransmission({}, {}, beam_radius={})",
            py_str(text(p, "transmission_sample")),
            py_str(text(p, "transmission_empty")),
            beam_radius
        ));

        let theta_dependent = py_bool(p.flag("theta_dependent_correction"));
        let fit_together = py_bool(p.flag("fit_frames_together"));
        lines.push(format!("ThetaDependentTransmission({})", theta_dependent));
        let data_file = py_str(text(p, "data_file"));
        lines.push(match p.text("nickname") {
            Some(nickname) => format!("AppendDataFile([{}], {})", data_file, py_str(nickname)),
            None => format!("AppendDataFile([{}])", data_file),
        });
        lines.push(format!("CombineTransmissionFits({})", fit_together));

        if p.flag("subtract_background") {
            lines.push(format!("Background({})", py_str(text(p, "background_file"))));
            lines.push(format!("BckThetaDependentTransmission({})", theta_dependent));
            lines.push(format!("BckCombineTransmissionFits({})", fit_together));
            lines.push(format!(
                "BckDirectBeamTransmission({}, {}, beam_radius={})",
                py_str(text(p, "background_transmission_sample")),
                py_str(text(p, "background_transmission_empty")),
                beam_radius
            ));
        }

        lines.push("SaveIq(process='None')".into());
        lines.push("Reduce()".into());
        lines.join("\n")
    }

    fn script_name(&self, index: Option<usize>) -> String {
        match index {
            Some(i) => format!("job_submission_{}.py", i),
            None => DEFAULT_SCRIPT_NAME.to_string(),
        }
    }
}
