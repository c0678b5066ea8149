use anyhow::Result;
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use regex::Regex;
use ort::{
    execution_providers::{ExecutionProvider,
                          CPUExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider,
                          CoreMLExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::{Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, Value},
};
use crate::common::InferenceDevice;
use crate::data::{ConfigOrt, TimeCalc, Xs, X, CROSS_MARK};
use crate::inference_runners::InferenceModel;

/// Names and element types of a session's inputs or outputs.
#[derive(Debug, Clone, Default)]
pub struct OrtTensorAttr {
    pub names: Vec<String>,
    pub dtypes: Vec<TensorElementType>,
}

/// Sets up the ONNX Runtime environment. Call once, before any session is built.
pub fn init_runtime(ort_lib_path: Option<&str>) -> Result<()> {
    let builder = match ort_lib_path {
        // Dynamically load the library from given path
        Some(path) => ort::init_from(path),
        None => ort::init(),
    };
    match builder.with_name("cxr_classify").commit() {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Failed to commit ORT: {:?}", e)),
    }
}

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    inputs_attrs: OrtTensorAttr,
    outputs_attrs: OrtTensorAttr,
    profile: bool,
    infer_time: TimeCalc,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt, device: InferenceDevice) -> Result<Self> {
        let mut builder = Session::builder()?;

        let mut device = device;
        let registered = match device {
            InferenceDevice::TensorRT(device_id) => Self::build_trt(
                &mut builder,
                device_id,
                config.trt_fp16_enable,
                config.trt_engine_cache_enable,
            ),
            InferenceDevice::CUDA(device_id) => Self::build_cuda(&mut builder, device_id),
            InferenceDevice::CoreML(_) => Self::build_coreml(&mut builder),
            InferenceDevice::CPU => Self::build_cpu(&mut builder),
        };
        if let Err(err) = registered {
            if !device.is_accelerator() {
                return Err(err);
            }
            log::warn!("{err}, Using cpu");
            device = InferenceDevice::CPU;
            Self::build_cpu(&mut builder)?;
        }

        let mut builder = builder.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(n) = config.intra_threads {
            builder = builder.with_intra_threads(n)?;
        }
        let session = builder.commit_from_file(&config.onnx_path)
            .map_err(|e| anyhow::anyhow!("Failed to load checkpoint {}: {e}", config.onnx_path))?;

        let inputs_attrs = OrtTensorAttr {
            names: session.inputs.iter().map(|x| x.name.to_string()).collect(),
            dtypes: session.inputs.iter()
                .map(|x| x.input_type.tensor_type().unwrap_or(TensorElementType::Float32))
                .collect(),
        };
        let outputs_attrs = OrtTensorAttr {
            names: session.outputs.iter().map(|x| x.name.to_string()).collect(),
            dtypes: session.outputs.iter()
                .map(|x| x.output_type.tensor_type().unwrap_or(TensorElementType::Float32))
                .collect(),
        };
        if inputs_attrs.names.is_empty() || outputs_attrs.names.is_empty() {
            anyhow::bail!("{CROSS_MARK} Model {} declares no inputs or no outputs", config.onnx_path);
        }

        log::info!(
            "Backend: ONNXRuntime | Device: {} | Inputs: {:?} | Outputs: {:?}",
            device,
            inputs_attrs.names,
            outputs_attrs.names,
        );

        let mut engine = Self {
            session,
            device,
            inputs_attrs,
            outputs_attrs,
            profile: config.profile,
            infer_time: TimeCalc::default(),
        };

        for _ in 0..config.num_dry_run {
            let shape = [1, 3, config.crop_height as usize, config.crop_width as usize];
            engine.engine_run(Xs::from(X::zeros(&shape)))?;
        }
        engine.infer_time.clear();

        Ok(engine)
    }

    fn build_trt(
        builder: &mut SessionBuilder,
        device_id: usize,
        fp16_enable: bool,
        engine_cache_enable: bool,
    ) -> Result<()> {
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(engine_cache_enable)
            .with_engine_cache_path("trt-cache");
        if trt.is_available()? {
            match trt.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} TensorRT initialization failed: {:?}", err) }
            }
            log::info!("Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CoreMLExecutionProvider::default()
            .with_subgraphs(false);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CoreML initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CoreML execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CPUExecutionProvider::default();
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CPU initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CPU execution provider not available")
        }
    }

    fn tensor_preprocess(x: X, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Value::from_array(x.into_inner())?.into_dyn(),
            TensorElementType::Float16 => Value::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Value::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            TensorElementType::Float64 => Value::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            _ => anyhow::bail!("Unsupported model input type: {:?}", dtype),
        };
        Ok(x)
    }

    fn tensor_postprocess(x: &DynValue, dtype: &TensorElementType) -> Result<Array<f32, IxDyn>> {
        fn _extract_and_convert<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            let x = x.try_extract_array::<T>()?;
            Ok(x.mapv(map_fn))
        }
        match dtype {
            TensorElementType::Float32 => _extract_and_convert::<f32>(x, |x| x),
            TensorElementType::Float16 => _extract_and_convert::<f16>(x, f16::to_f32),
            TensorElementType::Bfloat16 => _extract_and_convert::<bf16>(x, bf16::to_f32),
            TensorElementType::Float64 => _extract_and_convert::<f64>(x, |x| x as f32),
            TensorElementType::Int64 => _extract_and_convert::<i64>(x, |x| x as f32),
            TensorElementType::Int32 => _extract_and_convert::<i32>(x, |x| x as f32),
            _ => Err(anyhow::anyhow!("Unsupported ort tensor type: {:?}", dtype)),
        }
    }

    pub fn engine_run(&mut self, xs: Xs) -> Result<Xs> {
        anyhow::ensure!(
            xs.len() == self.inputs_attrs.names.len(),
            "Model expects {} inputs, got {}",
            self.inputs_attrs.names.len(),
            xs.len()
        );
        let mut ys = Xs::new();

        // alignment
        let t_pre = std::time::Instant::now();
        let mut xs_ = Vec::new();
        for (dtype, x) in self.inputs_attrs.dtypes.iter().zip(xs.into_iter()) {
            xs_.push(Into::<SessionInputValue<'_>>::into(Self::tensor_preprocess(
                x, dtype,
            )?));
        }
        self.infer_time.add_or_push(0, t_pre.elapsed());

        // run
        let t_run = std::time::Instant::now();
        let outputs = self.session.run(&xs_[..])?;
        self.infer_time.add_or_push(1, t_run.elapsed());

        // extract
        let t_post = std::time::Instant::now();
        for (dtype, name) in self.outputs_attrs.dtypes.iter().zip(self.outputs_attrs.names.iter()) {
            let y = Self::tensor_postprocess(&outputs[name.as_str()], dtype)?;
            ys.push_kv(name.as_str(), X::from(y))?;
        }
        self.infer_time.add_or_push(2, t_post.elapsed());

        if self.profile {
            log::info!("[Profile] alignment: {:?} | inference: {:?} | to_f32: {:?}",
                self.infer_time.avg_i(0),
                self.infer_time.avg_i(1),
                self.infer_time.avg_i(2),
            );
        }

        Ok(ys)
    }

    pub fn try_fetch(&self, key: &str) -> Option<String> {
        match self.session.metadata() {
            Err(_) => None,
            Ok(metadata) => metadata.custom(key).unwrap_or_default(),
        }
    }

    /// Class names from onnx metadata, stored as `{0: 'Normal', 1: 'Bacterial', ...}`.
    pub fn fetch_names(&self) -> Option<Vec<String>> {
        self.try_fetch("names").and_then(|names| parse_names(&names))
    }
}

impl InferenceModel for OrtEngine {
    fn forward(&mut self, xs: X) -> Result<Xs> {
        self.engine_run(Xs::from(xs))
    }

    fn class_names(&self) -> Option<Vec<String>> {
        self.fetch_names()
    }

    fn describe(&self) -> String {
        format!("ORT session on {}", self.device)
    }
}

pub(crate) fn parse_names(names: &str) -> Option<Vec<String>> {
    let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).ok()?;
    let names_: Vec<String> = re
        .captures_iter(names)
        .map(|x| x.extract())
        .map(|(_, [_, name, _])| name.to_string())
        .collect();
    if names_.is_empty() { None } else { Some(names_) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_names() {
        let names = parse_names("{0: 'Normal', 1: 'Bacterial', 2: 'Viral', 3: 'COVID-19'}").unwrap();
        assert_eq!(names, vec!["Normal", "Bacterial", "Viral", "COVID-19"]);
        assert_eq!(parse_names("{}"), None);
    }
}
