//! ResNet-18 for lesion classification
//!
//! Standard layout: 7x7 stem, four stages of two basic residual blocks
//! (64, 128, 256, 512 channels), global average pooling and a linear head.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the ResNet-18 classifier
#[derive(Config, Debug)]
pub struct ResNet18Config {
    /// Number of output classes
    #[config(default = "2")]
    pub num_classes: usize,
}

impl ResNet18Config {
    /// Initialize a randomly weighted model on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet18<B> {
        ResNet18::new(self.num_classes, device)
    }
}

/// 1x1 strided projection used when a block changes shape
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

/// Two 3x3 convolutions with an identity or projected shortcut
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B>,
    downsample: Option<Downsample<B>>,
    relu: Relu,
}

impl<B: Backend> BasicBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);

        let downsample = if stride != 1 || in_channels != out_channels {
            Some(Downsample::new(in_channels, out_channels, stride, device))
        } else {
            None
        };

        Self {
            conv1,
            bn1: BatchNormConfig::new(out_channels).init(device),
            conv2,
            bn2: BatchNormConfig::new(out_channels).init(device),
            downsample,
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(down) => down.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv1.forward(input);
        let x = self.bn1.forward(x);
        let x = self.relu.forward(x);
        let x = self.conv2.forward(x);
        let x = self.bn2.forward(x);

        self.relu.forward(x + identity)
    }
}

/// One ResNet stage: two basic blocks, the first may downsample
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    blocks: Vec<BasicBlock<B>>,
}

impl<B: Backend> Stage<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            blocks: vec![
                BasicBlock::new(in_channels, out_channels, stride, device),
                BasicBlock::new(out_channels, out_channels, 1, device),
            ],
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

/// ResNet-18 classifier
///
/// Maps `[N, 3, H, W]` images to `[N, num_classes]` logits for any H, W >= 32.
#[derive(Module, Debug)]
pub struct ResNet18<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B>,
    relu: Relu,
    maxpool: MaxPool2d,
    layer1: Stage<B>,
    layer2: Stage<B>,
    layer3: Stage<B>,
    layer4: Stage<B>,
    avgpool: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> ResNet18<B> {
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([3, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Self {
            conv1,
            bn1: BatchNormConfig::new(64).init(device),
            relu: Relu::new(),
            maxpool,
            layer1: Stage::new(64, 64, 1, device),
            layer2: Stage::new(64, 128, 2, device),
            layer3: Stage::new(128, 256, 2, device),
            layer4: Stage::new(256, 512, 2, device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(512, num_classes).init(device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(input);
        let x = self.bn1.forward(x);
        let x = self.relu.forward(x);
        let x = self.maxpool.forward(x);

        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);

        let x = self.avgpool.forward(x);
        let [batch, channels, _, _] = x.dims();
        let x = x.reshape([batch, channels]);

        self.fc.forward(x)
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_basic_block_downsamples() {
        let device = Default::default();
        let block = BasicBlock::<TestBackend>::new(8, 16, 2, &device);
        let x = Tensor::<TestBackend, 4>::zeros([1, 8, 8, 8], &device);
        assert_eq!(block.forward(x).dims(), [1, 16, 4, 4]);
    }

    #[test]
    fn test_resnet_output_shape() {
        let device = Default::default();
        let model = ResNet18Config::new().init::<TestBackend>(&device);
        assert_eq!(model.num_classes(), 2);

        let x = Tensor::<TestBackend, 4>::ones([2, 3, 32, 32], &device);
        assert_eq!(model.forward(x).dims(), [2, 2]);
    }
}
