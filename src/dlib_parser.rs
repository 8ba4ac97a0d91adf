use nom::bytes::complete::take;
use nom::combinator::{map, map_res, verify};
use nom::multi::{count, length_count};
use nom::number::complete::le_u8;
use nom::sequence::tuple;
use nom::IResult;

use crate::error::{Error, Result};
use crate::predictor::{RegressionTree, Shape, ShapePredictor, SplitFeature, Vector2};

// https://github.com/davisking/dlib/blob/master/dlib/serialize.h#L288
fn dlib_int(input: &[u8]) -> IResult<&[u8], i64> {
    let (input, control_byte) = verify(le_u8, |byte: &u8| byte & 0x0F <= 8)(input)?;
    let (input, buf) = take((control_byte & 0x0F) as usize)(input)?;

    let magnitude = buf.iter().rev().fold(0i64, |int, &byte| (int << 8) | i64::from(byte));

    if control_byte & 0x80 != 0 {
        Ok((input, -magnitude))
    } else {
        Ok((input, magnitude))
    }
}

fn dlib_len(input: &[u8]) -> IResult<&[u8], usize> {
    map_res(dlib_int, usize::try_from)(input)
}

// https://github.com/davisking/dlib/blob/master/dlib/float_details.h#L143
fn dlib_float(input: &[u8]) -> IResult<&[u8], f32> {
    map(tuple((dlib_int, dlib_int)), |(mantissa, exponent)| {
        ((mantissa as f64) * 2.0_f64.powi(exponent as i32)) as f32
    })(input)
}

// https://github.com/davisking/dlib/blob/master/dlib/geometry/vector.h#L1133
fn vector2(input: &[u8]) -> IResult<&[u8], Vector2> {
    map(tuple((dlib_float, dlib_float)), |(x, y)| Vector2::new(x, y))(input)
}

// https://github.com/davisking/dlib/blob/master/dlib/image_processing/shape_predictor.h#L34
fn split_feature(input: &[u8]) -> IResult<&[u8], SplitFeature> {
    map(tuple((dlib_len, dlib_len, dlib_float)), |(idx1, idx2, thresh)| SplitFeature {
        idx1,
        idx2,
        thresh,
    })(input)
}

// Newer dlib writes negated dimensions.
// https://github.com/davisking/dlib/blob/master/dlib/matrix/matrix.h#L1888
fn matrix_dimensions(input: &[u8]) -> IResult<&[u8], (usize, usize)> {
    map(tuple((dlib_int, dlib_int)), |(rows, cols)| {
        (rows.unsigned_abs() as usize, cols.unsigned_abs() as usize)
    })(input)
}

/// A `matrix<float, 0, 1>`; shapes and leaf values are always column vectors.
fn column_vector(input: &[u8]) -> IResult<&[u8], Shape> {
    let (input, (rows, _)) = verify(matrix_dimensions, |&(_, cols)| cols == 1)(input)?;
    map(count(dlib_float, rows), Shape::from_vec)(input)
}

// https://github.com/davisking/dlib/blob/master/dlib/image_processing/shape_predictor.h#L96
fn regression_tree(input: &[u8]) -> IResult<&[u8], RegressionTree> {
    map(
        tuple((
            length_count(dlib_len, split_feature),
            length_count(dlib_len, column_vector),
        )),
        |(splits, leaf_values)| RegressionTree { splits, leaf_values },
    )(input)
}

fn forest(input: &[u8]) -> IResult<&[u8], Vec<RegressionTree>> {
    length_count(dlib_len, regression_tree)(input)
}

fn anchors(input: &[u8]) -> IResult<&[u8], Vec<usize>> {
    length_count(dlib_len, dlib_len)(input)
}

fn deltas(input: &[u8]) -> IResult<&[u8], Vec<Vector2>> {
    length_count(dlib_len, vector2)(input)
}

// https://github.com/davisking/dlib/blob/master/dlib/image_processing/shape_predictor.h#L421
fn shape_predictor_body(input: &[u8]) -> IResult<&[u8], ShapePredictor> {
    map(
        tuple((
            column_vector,
            length_count(dlib_len, forest),
            length_count(dlib_len, anchors),
            length_count(dlib_len, deltas),
        )),
        |(initial_shape, forests, anchor_idx, deltas)| ShapePredictor {
            initial_shape,
            forests,
            anchor_idx,
            deltas,
        },
    )(input)
}

fn describe(err: nom::Err<nom::error::Error<&[u8]>>, total: usize) -> Error {
    match err {
        nom::Err::Incomplete(_) => Error::ModelParse("unexpected end of data".to_string()),
        nom::Err::Error(e) | nom::Err::Failure(e) => Error::ModelParse(format!(
            "{:?} at byte {}",
            e.code,
            total - e.input.len()
        )),
    }
}

pub fn parse_shape_predictor(slice: &[u8]) -> Result<ShapePredictor> {
    let (rest, version) = dlib_int(slice).map_err(|e| describe(e, slice.len()))?;
    if version != 1 {
        return Err(Error::UnsupportedVersion(version));
    }

    let (_, predictor) = shape_predictor_body(rest).map_err(|e| describe(e, slice.len()))?;
    Ok(predictor)
}
