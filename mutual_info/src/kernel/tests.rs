use common::FloatExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::software::software_mi;
use crate::volume::pack_samples;
use crate::Bin;

fn kernel_config(max_couples: u32) -> MiConfig {
    MiConfig {
        dimension: 8,
        partitions: 4,
        entropy_pe: 16,
        max_couples,
        ..Default::default()
    }
}

fn random_slices(seed: u64, slices: usize) -> (Vec<Bin>, Vec<Bin>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let reference: Vec<Bin> = (0..64 * slices).map(|_| rng.random_range(0..16)).collect();
    let floating = reference
        .iter()
        .map(|&r| r.saturating_add(rng.random_range(0..3)))
        .collect();
    (reference, floating)
}

#[tokio::test]
async fn streaming_run_matches_software() -> anyhow::Result<()> {
    let config = kernel_config(512);
    let (reference, floating) = random_slices(21, 4);
    let layout = config.sample_layout();
    let mut kernel = MutualInfoKernel::new(config)?;

    let (_, floating_stream) = spawn_feed("floating", pack_samples(&floating, layout), 2);
    let mi = kernel
        .run(floating_stream, &pack_samples(&reference, layout), 4)
        .await?;

    let expected = software_mi(&reference, &floating).mutual_information;
    assert!((mi as f64).within(expected, 1e-4), "{mi} vs {expected}");
    Ok(())
}

#[tokio::test]
async fn n_couples_is_clamped_to_the_maximum() -> anyhow::Result<()> {
    let config = kernel_config(2);
    let (reference, floating) = random_slices(22, 4);
    let layout = config.sample_layout();
    let mut kernel = MutualInfoKernel::new(config)?;

    // only the first two slices are streamed; an unclamped run would starve
    let (_, floating_stream) = spawn_feed("floating", pack_samples(&floating[..128], layout), 2);
    let mi = kernel
        .run(floating_stream, &pack_samples(&reference, layout), 100)
        .await?;

    let expected = software_mi(&reference[..128], &floating[..128]).mutual_information;
    assert!((mi as f64).within(expected, 1e-4));
    Ok(())
}

#[tokio::test]
async fn short_reference_is_rejected() -> anyhow::Result<()> {
    let config = kernel_config(512);
    let layout = config.sample_layout();
    let mut kernel = MutualInfoKernel::new(config)?;

    let (_, floating_stream) = spawn_feed("floating", Vec::<PackedWord>::new(), 2);
    let result = kernel
        .run(floating_stream, &pack_samples(&[0; 64], layout), 2)
        .await;

    assert_eq!(
        result,
        Err(Error::InputTooShort {
            input: "reference".to_string(),
            needed: 32,
            available: 16,
        })
    );
    Ok(())
}

#[tokio::test]
async fn cached_reference_matches_streaming_variant() -> anyhow::Result<()> {
    let config = kernel_config(512);
    let (reference, floating) = random_slices(23, 3);
    let layout = config.sample_layout();
    let reference_words = pack_samples(&reference, layout);
    let floating_words = pack_samples(&floating, layout);

    let mut streaming = MutualInfoKernel::new(config.clone())?;
    let (_, floating_stream) = spawn_feed("floating", floating_words.clone(), 2);
    let expected = streaming.run(floating_stream, &reference_words, 3).await?;

    let mut caching = MutualInfoKernel::new(config)?;
    let loaded = caching
        .handle(Request::LoadReference(&reference_words))
        .await?;
    assert_eq!(loaded, Response::success(0.0));

    let response = caching
        .handle(Request::Compute {
            floating: &floating_words,
            n_couples: 3,
        })
        .await?;
    assert_eq!(response.status, Status::Success);
    assert!(response.mutual_info.within(expected, 1e-6));
    assert!(caching.pipeline().lanes().iter().all(|lane| lane.is_empty()));

    // the reference stays loaded for further computations
    let again = caching
        .handle(Request::Compute {
            floating: &floating_words,
            n_couples: 3,
        })
        .await?;
    assert_eq!(again, response);
    Ok(())
}

#[tokio::test]
async fn raw_mode_selector() -> anyhow::Result<()> {
    let config = kernel_config(512);
    let layout = config.sample_layout();
    let (reference, _) = random_slices(24, 1);
    let words = pack_samples(&reference, layout);
    let mut kernel = MutualInfoKernel::new(config)?;

    let invalid = kernel.handle_raw(7, &words, 1).await?;
    assert_eq!(invalid.status.code(), -1);
    assert_eq!(invalid.mutual_info, 0.0);

    let loaded = kernel.handle_raw(0, &words, 1).await?;
    assert_eq!(loaded.status.code(), 1);
    assert_eq!(loaded.mutual_info, 0.0);

    // identical volumes: MI equals the marginal entropy
    let computed = kernel.handle_raw(1, &words, 1).await?;
    let expected = software_mi(&reference, &reference);
    assert_eq!(computed.status, Status::Success);
    assert!((computed.mutual_info as f64).within(expected.reference_entropy, 1e-4));
    Ok(())
}

#[tokio::test]
async fn compute_without_reference_fails() -> anyhow::Result<()> {
    let mut kernel = MutualInfoKernel::new(kernel_config(512))?;
    let result = kernel
        .handle(Request::Compute {
            floating: &[],
            n_couples: 1,
        })
        .await;

    assert_eq!(result, Err(Error::ReferenceNotLoaded));
    Ok(())
}

#[tokio::test]
async fn zero_couples_yield_zero_information() -> anyhow::Result<()> {
    let mut kernel = MutualInfoKernel::new(kernel_config(512))?;
    kernel.handle(Request::LoadReference(&[])).await?;

    let response = kernel
        .handle(Request::Compute {
            floating: &[],
            n_couples: 0,
        })
        .await?;
    assert_eq!(response, Response::success(0.0));
    Ok(())
}
