use crate::error::Result;
use crate::stream::{StreamReader, StreamWriter};

#[inline]
pub fn mutual_information(row_entropy: f32, col_entropy: f32, joint_entropy: f32) -> f32 {
    row_entropy + col_entropy - joint_entropy
}

/// Reads one entropy from each stream and writes `H(row) + H(col) - H(joint)`.
pub async fn compute_mutual_information(
    row: &mut StreamReader<f32>,
    col: &mut StreamReader<f32>,
    joint: &mut StreamReader<f32>,
    output: &StreamWriter<f32>,
) -> Result<()> {
    let row_entropy = row.read().await?;
    let col_entropy = col.read().await?;
    let joint_entropy = joint.read().await?;
    output
        .write(mutual_information(row_entropy, col_entropy, joint_entropy))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::stream;

    #[tokio::test]
    async fn combines_one_value_per_stream() -> anyhow::Result<()> {
        let (row_w, mut row) = stream("row", 1);
        let (col_w, mut col) = stream("col", 1);
        let (joint_w, mut joint) = stream("joint", 1);
        let (out_w, mut out) = stream("mi", 1);

        row_w.write(1.5).await?;
        col_w.write(2.0).await?;
        joint_w.write(3.0).await?;
        compute_mutual_information(&mut row, &mut col, &mut joint, &out_w).await?;

        assert_eq!(out.read().await?, 0.5);
        Ok(())
    }

    #[test]
    fn independent_variables_share_nothing() {
        assert_eq!(mutual_information(2.0, 3.0, 5.0), 0.0);
    }
}
