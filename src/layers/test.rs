use super::*;
use crate::device::HostCompute;
use crate::geometry::PaddedSquare;
use ndarray::{array, Array2, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;

const EPS: f32 = 1e-2;
const TOLERANCE: f32 = 2e-2;

/// Weighted sum of the layer output, so that the output gradient is `weights`.
fn probe_loss<L: Layer>(layer: &mut L, input: &ArrayD<f32>, weights: &ArrayD<f32>) -> f32 {
    let out = layer
        .forward(input.clone(), Mode::Eval, &HostCompute)
        .unwrap();
    (&out * weights).sum()
}

fn random_array(shape: &[usize], rng: &mut StdRng) -> ArrayD<f32> {
    ArrayD::from_shape_simple_fn(shape, || rng.gen_range(-1f32..1.))
}

/// Compares the analytic input gradient against central differences.
fn check_input_gradient<L: Layer>(layer: &mut L, input: ArrayD<f32>, rng: &mut StdRng) {
    let out = layer
        .forward(input.clone(), Mode::Eval, &HostCompute)
        .unwrap();
    let weights = random_array(out.shape(), rng);
    let analytic = layer.backward(weights.clone(), &HostCompute).unwrap();
    assert_eq!(analytic.shape(), input.shape());

    for idx in 0..input.len() {
        let mut plus = input.clone();
        plus.as_slice_mut().unwrap()[idx] += EPS;
        let mut minus = input.clone();
        minus.as_slice_mut().unwrap()[idx] -= EPS;
        let numeric =
            (probe_loss(layer, &plus, &weights) - probe_loss(layer, &minus, &weights)) / (2. * EPS);
        let got = analytic.as_slice().unwrap()[idx];
        assert!(
            (numeric - got).abs() < TOLERANCE,
            "input gradient {} differs: analytic {} numeric {}",
            idx,
            got,
            numeric
        );
    }
}

/// Compares the analytic gradient of the first parameter against central differences.
fn check_weight_gradient<L: Layer>(layer: &mut L, input: ArrayD<f32>, rng: &mut StdRng) {
    let out = layer
        .forward(input.clone(), Mode::Eval, &HostCompute)
        .unwrap();
    let weights = random_array(out.shape(), rng);
    layer.backward(weights.clone(), &HostCompute).unwrap();
    let analytic = layer.params()[0].grad.clone();

    for idx in 0..analytic.len() {
        let original = layer.params()[0].value.as_slice().unwrap()[idx];
        layer.params()[0].value.as_slice_mut().unwrap()[idx] = original + EPS;
        let plus = probe_loss(layer, &input, &weights);
        layer.params()[0].value.as_slice_mut().unwrap()[idx] = original - EPS;
        let minus = probe_loss(layer, &input, &weights);
        layer.params()[0].value.as_slice_mut().unwrap()[idx] = original;

        let numeric = (plus - minus) / (2. * EPS);
        let got = analytic.as_slice().unwrap()[idx];
        assert!(
            (numeric - got).abs() < TOLERANCE,
            "weight gradient {} differs: analytic {} numeric {}",
            idx,
            got,
            numeric
        );
    }
}

#[test]
fn linear_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut layer = Linear::new(5, 3, &mut rng);
    let input = random_array(&[4, 5], &mut rng);
    check_input_gradient(&mut layer, input.clone(), &mut rng);
    check_weight_gradient(&mut layer, input, &mut rng);
}

#[test]
fn conv_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut layer = Conv2d::new(2, 3, PaddedSquare::from_side(3), &mut rng);
    let input = random_array(&[2, 2, 5, 5], &mut rng);
    check_input_gradient(&mut layer, input.clone(), &mut rng);
    check_weight_gradient(&mut layer, input, &mut rng);
}

#[test]
fn padded_conv_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut layer = Conv2d::new(1, 2, PaddedSquare::from_side(3), &mut rng).with_padding(1);
    let input = random_array(&[1, 1, 4, 4], &mut rng);
    let out = layer
        .forward(input.clone(), Mode::Eval, &HostCompute)
        .unwrap();
    assert_eq!(out.shape(), &[1, 2, 4, 4]);
    check_input_gradient(&mut layer, input, &mut rng);
}

#[test]
fn log_softmax_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(4);
    let input = random_array(&[3, 4], &mut rng);
    check_input_gradient(&mut LogSoftmax::new(), input, &mut rng);
}

#[test]
fn conv_output_shape_follows_geometry() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut layer = Conv2d::new(1, 4, PaddedSquare::from_side(3), &mut rng);
    let out = layer
        .forward(ArrayD::zeros(vec![2, 1, 28, 28]), Mode::Train, &HostCompute)
        .unwrap();
    assert_eq!(out.shape(), &[2, 4, 26, 26]);
    assert_eq!(layer.num_params(), 4 * 9 + 4);
}

#[test]
fn conv_rejects_wrong_channel_count() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut layer = Conv2d::new(3, 4, PaddedSquare::from_side(3), &mut rng);
    let result = layer.forward(ArrayD::zeros(vec![1, 1, 8, 8]), Mode::Train, &HostCompute);
    assert!(matches!(result, Err(BenchError::Shape(_))));
}

#[test]
fn max_pool_routes_gradient_to_maximum() {
    let mut pool = MaxPool2d::new(2);
    let input = Array4::from_shape_vec(
        (1, 1, 2, 4),
        vec![1f32, 5., 0., 0., 2., 3., 0., 7.],
    )
    .unwrap()
    .into_dyn();
    let out = pool.forward(input, Mode::Train, &HostCompute).unwrap();
    assert_eq!(out.into_raw_vec(), vec![5., 7.]);

    let grad = Array4::from_shape_vec((1, 1, 1, 2), vec![1f32, 2.]).unwrap().into_dyn();
    let input_grad = pool.backward(grad, &HostCompute).unwrap();
    assert_eq!(
        input_grad.into_raw_vec(),
        vec![0., 1., 0., 0., 0., 0., 0., 2.]
    );
}

#[test]
fn relu_masks_negative_inputs() {
    let mut relu = Relu::new();
    let out = relu
        .forward(array![[-1f32, 2.], [0., 3.]].into_dyn(), Mode::Train, &HostCompute)
        .unwrap();
    assert_eq!(out, array![[0f32, 2.], [0., 3.]].into_dyn());
    let grad = relu
        .backward(Array2::from_elem((2, 2), 1f32).into_dyn(), &HostCompute)
        .unwrap();
    assert_eq!(grad, array![[0f32, 1.], [0., 1.]].into_dyn());
}

#[test]
fn dropout_is_identity_in_eval_mode() {
    let mut dropout = Dropout::new(0.5);
    let input = array![[1f32, 2., 3.]].into_dyn();
    let out = dropout
        .forward(input.clone(), Mode::Eval, &HostCompute)
        .unwrap();
    assert_eq!(out, input);
}

#[test]
fn dropout_drops_whole_channels() {
    let mut dropout = Dropout::new(0.5);
    let input = ArrayD::from_elem(vec![8, 4, 3, 3], 1f32);
    let out = dropout.forward(input, Mode::Train, &HostCompute).unwrap();
    for sample in out.outer_iter() {
        for plane in sample.outer_iter() {
            let first = plane.iter().next().cloned().unwrap();
            assert!(first == 0. || first == 2.);
            assert!(plane.iter().all(|&v| v == first));
        }
    }
}

#[test]
fn flatten_restores_shape_on_backward() {
    let mut flatten = Flatten::new();
    let out = flatten
        .forward(ArrayD::zeros(vec![2, 3, 4, 4]), Mode::Train, &HostCompute)
        .unwrap();
    assert_eq!(out.shape(), &[2, 48]);
    let grad = flatten.backward(out, &HostCompute).unwrap();
    assert_eq!(grad.shape(), &[2, 3, 4, 4]);
}

#[test]
fn backward_before_forward_is_an_error() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut linear = Linear::new(2, 2, &mut rng);
    let result = linear.backward(ArrayD::zeros(vec![1, 2]), &HostCompute);
    assert!(matches!(result, Err(BenchError::BackwardBeforeForward("linear"))));
}
